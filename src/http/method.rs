use strum::{Display, EnumString, IntoStaticStr};

/// Request methods the engine understands. Parsing is case-insensitive since
/// the request line token is upper-cased before lookup anyway.
#[derive(EnumString, IntoStaticStr, Display, Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[strum(ascii_case_insensitive)]
pub enum Method {
    #[strum(serialize = "GET")]
    GET,
    #[strum(serialize = "POST")]
    POST,
    #[strum(serialize = "HEAD")]
    HEAD,
    #[strum(serialize = "DELETE")]
    DELETE,
    #[strum(serialize = "PUT")]
    PUT,
}
