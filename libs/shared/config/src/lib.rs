use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_base_url: String,
    pub consultation_fee: u64,
    pub payment_currency: String,
    pub classification_api_url: String,
    pub meeting_base_url: String,
    pub meeting_namespace: String,
    pub port: u16,
}

fn var_or_empty(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", key);
        String::new()
    })
}

fn var_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using default", key);
        default.to_string()
    })
}

impl AppConfig {
    pub fn from_env() -> Self {
        let consultation_fee = env::var("CONSULTATION_FEE")
            .ok()
            .and_then(|fee| fee.parse().ok())
            .unwrap_or_else(|| {
                warn!("CONSULTATION_FEE not set or invalid, using default");
                500
            });

        let port = env::var("PORT")
            .ok()
            .and_then(|port| port.parse().ok())
            .unwrap_or(3000);

        let config = Self {
            supabase_url: var_or_empty("SUPABASE_URL"),
            supabase_anon_key: var_or_empty("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_jwt_secret: var_or_empty("SUPABASE_JWT_SECRET"),
            supabase_service_role_key: var_or_empty("SUPABASE_SERVICE_ROLE_KEY"),
            razorpay_key_id: var_or_empty("RAZORPAY_KEY_ID"),
            razorpay_key_secret: var_or_empty("RAZORPAY_KEY_SECRET"),
            razorpay_base_url: var_or_default("RAZORPAY_BASE_URL", "https://api.razorpay.com"),
            consultation_fee,
            payment_currency: var_or_default("PAYMENT_CURRENCY", "INR"),
            classification_api_url: var_or_default("CLASSIFICATION_API_URL", "http://localhost:5000/api"),
            meeting_base_url: var_or_default("MEETING_BASE_URL", "https://meet.jit.si"),
            meeting_namespace: var_or_default("MEETING_NAMESPACE", "ongogenesis"),
            port,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if !config.is_payment_configured() {
            warn!("Razorpay credentials missing - payments run in test mode");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_payment_configured(&self) -> bool {
        !self.razorpay_key_id.is_empty() && !self.razorpay_key_secret.is_empty()
    }

    /// Key used for privileged store writes; falls back to the anon key.
    pub fn store_api_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}
