use super::parsing::{
    collect_api_keys, env_optional, env_or_default, is_supported_image_extension, parse_bool,
    parse_cors_origins, parse_environment, parse_string_list, parse_u16, parse_u64,
};
use super::types::{
    ApiSettings, ConfigError, CorsSettings, DatabaseSettings, GeminiSettings, RuntimeSettings,
    ServerHost, ServerPort, ServerSettings, Settings, StorageSettings, TelemetrySettings,
};

const MAX_BACKUP_KEYS: usize = 5;
const MAX_CREDENTIAL_RESET_INTERVAL_HOURS: u64 = 24 * 365;

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("EXAM_CHECKER_HOST", "0.0.0.0");
        let port = env_or_default("EXAM_CHECKER_PORT", "8000");

        let environment = parse_environment(
            env_optional("EXAM_CHECKER_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("EXAM_CHECKER_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Exam Checker API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "exam_checker");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "exam_checker");
        let database_url = env_optional("DATABASE_URL");

        let api_keys = collect_api_keys(
            env_optional("GEMINI_API_KEY"),
            (1..=MAX_BACKUP_KEYS).map(|slot| env_optional(&format!("GEMINI_API_KEY_BACKUP_{slot}"))),
        );
        let gemini_base_url =
            env_or_default("GEMINI_BASE_URL", "https://generativelanguage.googleapis.com");
        let gemini_model = env_or_default("GEMINI_MODEL", "gemini-1.5-flash");
        let gemini_request_timeout =
            parse_u64("GEMINI_REQUEST_TIMEOUT", env_or_default("GEMINI_REQUEST_TIMEOUT", "120"))?;
        let credential_reset_interval_hours = parse_u64(
            "CREDENTIAL_RESET_INTERVAL_HOURS",
            env_or_default("CREDENTIAL_RESET_INTERVAL_HOURS", "24"),
        )?;

        let max_upload_size_mb =
            parse_u64("MAX_UPLOAD_SIZE_MB", env_or_default("MAX_UPLOAD_SIZE_MB", "10"))?;
        let allowed_image_extensions = parse_string_list(
            env_optional("ALLOWED_IMAGE_EXTENSIONS"),
            &["png", "jpg", "jpeg", "gif", "bmp", "webp"],
        );
        let max_images_per_submission = parse_u64(
            "MAX_IMAGES_PER_SUBMISSION",
            env_or_default("MAX_IMAGES_PER_SUBMISSION", "20"),
        )?;

        let log_level = env_or_default("EXAM_CHECKER_LOG_LEVEL", "info");
        let json = env_optional("EXAM_CHECKER_LOG_JSON")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            gemini: GeminiSettings {
                api_keys,
                base_url: gemini_base_url.trim_end_matches('/').to_string(),
                model: gemini_model,
                request_timeout: gemini_request_timeout,
                credential_reset_interval_hours,
            },
            storage: StorageSettings {
                max_upload_size_mb,
                allowed_image_extensions,
                max_images_per_submission,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn gemini(&self) -> &GeminiSettings {
        &self.gemini
    }

    pub(crate) fn storage(&self) -> &StorageSettings {
        &self.storage
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.allowed_image_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ALLOWED_IMAGE_EXTENSIONS",
                value: String::from("<empty>"),
            });
        }
        for extension in &self.storage.allowed_image_extensions {
            if !is_supported_image_extension(extension) {
                return Err(ConfigError::InvalidValue {
                    field: "ALLOWED_IMAGE_EXTENSIONS",
                    value: extension.clone(),
                });
            }
        }

        if self.storage.max_upload_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_UPLOAD_SIZE_MB",
                value: String::from("0"),
            });
        }

        let reset_hours = self.gemini.credential_reset_interval_hours;
        if reset_hours > MAX_CREDENTIAL_RESET_INTERVAL_HOURS {
            return Err(ConfigError::InvalidValue {
                field: "CREDENTIAL_RESET_INTERVAL_HOURS",
                value: reset_hours.to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }

        if self.gemini.api_keys.is_empty() {
            return Err(ConfigError::MissingSecret("GEMINI_API_KEY"));
        }

        Ok(())
    }
}
