use std::sync::LazyLock;

pub const DEBUG_SEND_ENV: &str = "FERROUS_FORWARD_DEBUG_SEND";

static DEBUG_SEND: LazyLock<bool> = LazyLock::new(|| {
    std::env::var(DEBUG_SEND_ENV)
        .map(|value| is_truthy(&value))
        .unwrap_or(false)
});

/// Whether per-attempt send logging was switched on from the environment.
/// Read once per process.
pub fn debug_send_from_env() -> bool {
    *DEBUG_SEND
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
