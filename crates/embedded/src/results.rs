//! Compilation results

use crate::error::{CompilerMessage, LifecycleError};
use url::Url;

/// A successful compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileResults {
    pub css: String,
    /// Present when a source map was requested
    pub source_map: Option<String>,
    /// Canonical URLs of every stylesheet that participated
    pub loaded_urls: Vec<Url>,
    /// Warnings, deprecations, and `@debug` output, in emission order
    pub messages: Vec<CompilerMessage>,
}

impl CompileResults {
    /// Rewrite the results for writing to known output locations: append
    /// a `sourceMappingURL` comment to the CSS (relative to the CSS file
    /// when possible) and stamp the map's `file` field.
    ///
    /// Fails when no source map was produced or the map is not valid
    /// JSON.
    pub fn with_file_locations(
        mut self,
        css_url: &Url,
        source_map_url: &Url,
    ) -> Result<Self, LifecycleError> {
        let map_text = self.source_map.take().ok_or_else(|| {
            LifecycleError::new("compilation produced no source map to relocate")
        })?;

        let mut map: serde_json::Value = serde_json::from_str(&map_text)
            .map_err(|e| LifecycleError::new(format!("source map is not JSON: {}", e)))?;
        if let Some(object) = map.as_object_mut() {
            let file = css_url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .unwrap_or("stylesheet.css");
            object.insert(
                "file".to_string(),
                serde_json::Value::String(file.to_string()),
            );
        }

        let reference = css_url
            .make_relative(source_map_url)
            .unwrap_or_else(|| source_map_url.to_string());
        if !self.css.ends_with('\n') {
            self.css.push('\n');
        }
        self.css
            .push_str(&format!("/*# sourceMappingURL={} */\n", reference));

        self.source_map = Some(
            serde_json::to_string(&map)
                .map_err(|e| LifecycleError::new(format!("source map reserialize: {}", e)))?,
        );
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(source_map: Option<&str>) -> CompileResults {
        CompileResults {
            css: "a {\n  b: c;\n}".to_string(),
            source_map: source_map.map(String::from),
            loaded_urls: vec![],
            messages: vec![],
        }
    }

    #[test]
    fn test_file_locations_rewrites_css_and_map() {
        let css_url = Url::parse("file:///out/site.css").unwrap();
        let map_url = Url::parse("file:///out/site.css.map").unwrap();
        let relocated = results(Some(r#"{"version":3,"sources":[]}"#))
            .with_file_locations(&css_url, &map_url)
            .unwrap();

        assert!(
            relocated
                .css
                .ends_with("/*# sourceMappingURL=site.css.map */\n")
        );
        let map: serde_json::Value =
            serde_json::from_str(relocated.source_map.as_deref().unwrap()).unwrap();
        assert_eq!(map["file"], "site.css");
    }

    #[test]
    fn test_file_locations_requires_a_map() {
        let css_url = Url::parse("file:///out/site.css").unwrap();
        let map_url = Url::parse("file:///out/site.css.map").unwrap();
        let err = results(None)
            .with_file_locations(&css_url, &map_url)
            .unwrap_err();
        assert!(err.message.contains("no source map"));
    }

    #[test]
    fn test_absolute_reference_when_not_relative() {
        let css_url = Url::parse("file:///out/site.css").unwrap();
        let map_url = Url::parse("https://cdn.example/site.css.map").unwrap();
        let relocated = results(Some("{}"))
            .with_file_locations(&css_url, &map_url)
            .unwrap();
        assert!(
            relocated
                .css
                .contains("sourceMappingURL=https://cdn.example/site.css.map")
        );
    }
}
