/// Default catalog of mirrored services
pub const DEFAULT_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/benbusby/farside/main/services-full.json";

/// Port used when neither the config file nor `PORT` selects one
pub const DEFAULT_PORT: u16 = 3000;

/// Environment variable overriding the listening port
pub const PORT_ENV: &str = "PORT";

/// Separator between alternate URLs of one instance group in the catalog
pub const GROUP_SEPARATOR: char = '|';

/// Body returned when a known service has no available instance
pub const NO_SERVER_BODY: &str = r#"{"status": 400, "message": "No server available to redirect"}"#;
