use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use crate::slot::{Result, UploadError};
use crate::transport::{BlobStore, HttpTransport, LocalTransport, Transport};

/// 5MB
pub const DEFAULT_MAX_SIZE: u64 = 5 * 1024 * 1024;

// 用于序列化 Duration（毫秒）
fn serialize_duration<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub slot: SlotOptions,
    pub transport: TransportConfig,
}

impl Config {
    pub fn from_toml(data: &str) -> Result<Config> {
        toml::from_str(data).map_err(|err| UploadError::Config(err.to_string()))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Config> {
        let data = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml(&data)
    }
}

/// 上传槽位的校验配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotOptions {
    /// 单个文件最大字节数
    pub max_size: u64,
    /// 一次最多选择的文件数，0 表示不限制
    pub limit: usize,
    /// HTML accept 语法，空字符串表示接受所有类型
    pub accept: String,
}

impl Default for SlotOptions {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            limit: 3,
            accept: "image/*".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    /// 本地 blob 存储，模拟进度
    Local {
        #[serde(default = "default_steps")]
        steps: u32,
        #[serde(
            default = "default_step_delay",
            serialize_with = "serialize_duration",
            deserialize_with = "deserialize_duration"
        )]
        step_delay: Duration,
    },
    /// HTTP POST 上传
    Http {
        endpoint: String,
        #[serde(default)]
        token: Option<String>,
        #[serde(
            default = "default_timeout",
            serialize_with = "serialize_duration",
            deserialize_with = "deserialize_duration"
        )]
        timeout: Duration,
    },
}

fn default_steps() -> u32 {
    10
}

fn default_step_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Local {
            steps: default_steps(),
            step_delay: default_step_delay(),
        }
    }
}

impl TransportConfig {
    pub fn build(&self) -> Result<Arc<dyn Transport>> {
        match self {
            TransportConfig::Local { steps, step_delay } => {
                let transport = LocalTransport::new(BlobStore::new())
                    .with_steps(*steps)
                    .with_step_delay(*step_delay);
                Ok(Arc::new(transport))
            }
            TransportConfig::Http { endpoint, token, timeout } => {
                let mut transport = HttpTransport::new(endpoint, *timeout)?;
                if let Some(token) = token {
                    transport = transport.with_token(token);
                }
                Ok(Arc::new(transport))
            }
        }
    }
}
