use std::env;
use std::sync::OnceLock;

static SRT_DISABLE_OUT_VARIANT: OnceLock<bool> = OnceLock::new();
static SRT_DISABLE_VECTORIZE: OnceLock<bool> = OnceLock::new();
static SRT_PROFILE_NODES: OnceLock<bool> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

fn flag(cell: &'static OnceLock<bool>, name: &str) -> bool {
    *cell.get_or_init(|| match env::var(name) {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => false,
    })
}

pub(crate) fn out_variant_disabled() -> bool {
    flag(&SRT_DISABLE_OUT_VARIANT, "SRT_DISABLE_OUT_VARIANT")
}

pub(crate) fn vectorize_disabled() -> bool {
    flag(&SRT_DISABLE_VECTORIZE, "SRT_DISABLE_VECTORIZE")
}

pub(crate) fn profile_nodes_enabled() -> bool {
    flag(&SRT_PROFILE_NODES, "SRT_PROFILE_NODES")
}

#[cfg(test)]
mod tests {
    use super::parse_bool;

    #[test]
    fn parse_bool_accepts_common_truthy_spellings() {
        for value in ["1", "true", "YES", " on "] {
            assert!(parse_bool(value), "{value}");
        }
        for value in ["0", "false", "off", "", "2"] {
            assert!(!parse_bool(value), "{value}");
        }
    }
}
