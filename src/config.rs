use std::env;

const DEFAULT_MAX_UPLOAD_SIZE: usize = 1024 * 1024 * 1024;
const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub sqlite_path: String,
    pub database_url: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub s3_bucket: String,
    pub mq_url: Option<String>,
    pub mq_pool_size: u8,
    pub resource_topic: String,
    pub event_queue_capacity: usize,
    pub max_upload_size: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);

        let sqlite_path =
            env::var("SQLITE_PATH").unwrap_or_else(|_| "./data/resources.sqlite".to_string());
        let database_url = non_empty("DATABASE_URL");

        let s3_endpoint = non_empty("S3_ENDPOINT");
        let s3_region = env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let s3_access_key = non_empty("S3_ACCESS_KEY");
        let s3_secret_key = non_empty("S3_SECRET_KEY");
        let s3_bucket = env::var("S3_BUCKET").unwrap_or_else(|_| "music-app".to_string());

        let mq_url = non_empty("MQ_URL");
        let mq_pool_size = env::var("MQ_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
            .unwrap_or(5);
        let resource_topic =
            env::var("RESOURCE_TOPIC").unwrap_or_else(|_| "resources".to_string());
        let event_queue_capacity = env::var("EVENT_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_EVENT_QUEUE_CAPACITY);

        let max_upload_size = env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE);

        Self {
            server_port,
            sqlite_path,
            database_url,
            s3_endpoint,
            s3_region,
            s3_access_key,
            s3_secret_key,
            s3_bucket,
            mq_url,
            mq_pool_size,
            resource_topic,
            event_queue_capacity,
            max_upload_size,
        }
    }

    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }

        let path = self.sqlite_path.trim();
        if path.starts_with("sqlite:") || path.starts_with("file:") {
            return path.to_string();
        }
        format!("sqlite://{}?mode=rwc", path)
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self {
            server_port: 0,
            sqlite_path: String::new(),
            database_url: Some("sqlite::memory:".to_string()),
            s3_endpoint: None,
            s3_region: "us-east-1".to_string(),
            s3_access_key: None,
            s3_secret_key: None,
            s3_bucket: "music-app".to_string(),
            mq_url: None,
            mq_pool_size: 1,
            resource_topic: "resources".to_string(),
            event_queue_capacity: 16,
            max_upload_size: 1024,
        }
    }
}
