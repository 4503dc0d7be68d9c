use serde::{Deserialize, Serialize};

pub const DEFAULT_CACHE_KEY_PREFIX: &str = "_lz_if_";
pub const DEFAULT_PLACEHOLDER_COMMENT: &str = "lazy-load-placeholder";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Client,
    Server,
}

/// Options for one compile pass. Every field has a default, so `{}` is a
/// valid JSON options object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    pub file_path: String,
    /// Compiling a server renderer
    pub ssr: bool,
    /// Compiling inside a server render pass (e.g. a component compiled for SSR)
    #[serde(rename = "inSSR")]
    pub in_ssr: bool,
    pub cache_key_prefix: String,
    pub placeholder_comment: String,
    /// Check directive values and interpolations parse as JavaScript
    pub validate_expressions: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            file_path: "anonymous.vue".to_string(),
            ssr: false,
            in_ssr: false,
            cache_key_prefix: DEFAULT_CACHE_KEY_PREFIX.to_string(),
            placeholder_comment: DEFAULT_PLACEHOLDER_COMMENT.to_string(),
            validate_expressions: true,
        }
    }
}

impl CompileOptions {
    pub fn server() -> Self {
        CompileOptions {
            ssr: true,
            ..Default::default()
        }
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    pub fn render_mode(&self) -> RenderMode {
        if self.ssr || self.in_ssr {
            RenderMode::Server
        } else {
            RenderMode::Client
        }
    }

    /// Stable string identifying every option that changes compiler output.
    pub fn fingerprint(&self) -> String {
        format!(
            "ssr={};inSSR={};prefix={};placeholder={};validate={}",
            self.ssr,
            self.in_ssr,
            self.cache_key_prefix,
            self.placeholder_comment,
            self.validate_expressions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let options: CompileOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, CompileOptions::default());
        assert_eq!(options.render_mode(), RenderMode::Client);
        assert_eq!(options.cache_key_prefix, "_lz_if_");
    }

    #[test]
    fn test_either_ssr_flag_selects_server_mode() {
        let options: CompileOptions = serde_json::from_str(r#"{"inSSR": true}"#).unwrap();
        assert_eq!(options.render_mode(), RenderMode::Server);
        assert_eq!(CompileOptions::server().render_mode(), RenderMode::Server);
    }

    #[test]
    fn test_fingerprint_ignores_file_path() {
        let a = CompileOptions::default().with_file_path("a.vue");
        let b = CompileOptions::default().with_file_path("b.vue");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), CompileOptions::server().fingerprint());
    }
}
