//! Application identity sent with the connection-init prefix.

/// Identity fields the protocol requires ahead of a session's first request.
///
/// Serialized into the `initConnection` wrapper in this exact field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInformation {
    /// API id issued to the application.
    pub app_id: u32,
    /// Device description, e.g. `"pc"`.
    pub device_info: String,
    /// Operating system description.
    pub os_info: String,
    /// Application version string.
    pub app_version: String,
    /// ISO 639-1 language code.
    pub language_code: String,
}
