//! Server configuration, read from `SHOP_*` environment variables.
//!
//! Missing or malformed values are logged and replaced with a default, so the server always starts. Missing gateway
//! credentials are the exception worth watching for in the logs: every notification will then fail verification.
use std::env;

use chrono::Duration;
use log::*;
use shop_common::{helpers::parse_boolean_flag, Secret};
use shop_payment_engine::gateways::{AlipayClient, WechatClient};

const DEFAULT_SHOP_HOST: &str = "127.0.0.1";
const DEFAULT_SHOP_PORT: u16 = 8360;
const DEFAULT_ORDER_TTL: Duration = Duration::minutes(30);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub alipay: AlipayConfig,
    pub wechat: WechatConfig,
    /// The time an order may stay unpaid before the expiry worker closes it.
    pub order_ttl: Duration,
    /// If false, unpaid orders are never closed automatically.
    pub expiry_worker: bool,
}

#[derive(Clone, Debug, Default)]
pub struct AlipayConfig {
    pub app_id: String,
    pub secret: Secret<String>,
}

#[derive(Clone, Debug, Default)]
pub struct WechatConfig {
    pub app_id: String,
    pub mch_id: String,
    pub api_key: Secret<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SHOP_HOST.to_string(),
            port: DEFAULT_SHOP_PORT,
            database_url: String::default(),
            alipay: AlipayConfig::default(),
            wechat: WechatConfig::default(),
            order_ttl: DEFAULT_ORDER_TTL,
            expiry_worker: true,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SHOP_HOST").ok().unwrap_or_else(|| DEFAULT_SHOP_HOST.into());
        let port = env::var("SHOP_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SHOP_PORT. {e} Using the default, {DEFAULT_SHOP_PORT}, \
                         instead."
                    );
                    DEFAULT_SHOP_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SHOP_PORT);
        let database_url = env::var("SHOP_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SHOP_DATABASE_URL is not set. Please set it to the URL for the shop database.");
            String::default()
        });
        let alipay = AlipayConfig::from_env_or_defaults();
        let wechat = WechatConfig::from_env_or_defaults();
        let order_ttl = configure_order_ttl(env::var("SHOP_ORDER_TTL").ok());
        let expiry_worker = parse_boolean_flag(env::var("SHOP_EXPIRY_WORKER").ok(), true);
        if !expiry_worker {
            info!("🪛️ The unpaid order expiry worker is disabled. Unpaid orders will stay open indefinitely.");
        }
        Self { host, port, database_url, alipay, wechat, order_ttl, expiry_worker }
    }

    pub fn alipay_client(&self) -> AlipayClient {
        AlipayClient::new(self.alipay.app_id.as_str(), self.alipay.secret.clone())
    }

    pub fn wechat_client(&self) -> WechatClient {
        WechatClient::new(self.wechat.app_id.as_str(), self.wechat.mch_id.as_str(), self.wechat.api_key.clone())
    }
}

impl AlipayConfig {
    pub fn from_env_or_defaults() -> Self {
        let app_id = env::var("SHOP_ALIPAY_APP_ID").ok().unwrap_or_else(|| {
            error!("🪛️ SHOP_ALIPAY_APP_ID is not set. Please set it to the application id of your Alipay app.");
            String::default()
        });
        let secret = Secret::new(env::var("SHOP_ALIPAY_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ SHOP_ALIPAY_SECRET is not set. Alipay notifications cannot be verified and will all be rejected."
            );
            String::default()
        }));
        Self { app_id, secret }
    }
}

impl WechatConfig {
    pub fn from_env_or_defaults() -> Self {
        let app_id = env::var("SHOP_WECHAT_APP_ID").ok().unwrap_or_else(|| {
            error!("🪛️ SHOP_WECHAT_APP_ID is not set. Please set it to the application id of your WeChat Pay app.");
            String::default()
        });
        let mch_id = env::var("SHOP_WECHAT_MCH_ID").ok().unwrap_or_else(|| {
            error!("🪛️ SHOP_WECHAT_MCH_ID is not set. Please set it to your WeChat Pay merchant id.");
            String::default()
        });
        let api_key = Secret::new(env::var("SHOP_WECHAT_API_KEY").ok().unwrap_or_else(|| {
            error!(
                "🪛️ SHOP_WECHAT_API_KEY is not set. WeChat Pay notifications cannot be verified and will all be \
                 rejected."
            );
            String::default()
        }));
        Self { app_id, mch_id, api_key }
    }
}

fn configure_order_ttl(value: Option<String>) -> Duration {
    let Some(s) = value else {
        info!(
            "🪛️ SHOP_ORDER_TTL is not set. Using the default value of {} minutes.",
            DEFAULT_ORDER_TTL.num_minutes()
        );
        return DEFAULT_ORDER_TTL;
    };
    match s.trim().parse::<i64>() {
        Ok(minutes) if minutes > 0 => Duration::minutes(minutes),
        Ok(minutes) => {
            warn!(
                "🪛️ SHOP_ORDER_TTL must be positive, but was {minutes}. Using the default value of {} minutes.",
                DEFAULT_ORDER_TTL.num_minutes()
            );
            DEFAULT_ORDER_TTL
        },
        Err(e) => {
            warn!(
                "🪛️ Invalid configuration value for SHOP_ORDER_TTL. {e}. Using the default value of {} minutes.",
                DEFAULT_ORDER_TTL.num_minutes()
            );
            DEFAULT_ORDER_TTL
        },
    }
}
