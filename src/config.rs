use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::keywords::{
    KeywordDictionary, DEFAULT_CATEGORIES, DEFAULT_CATEGORY, DEFAULT_COMPANY_KEYWORDS,
    DEFAULT_REQUIREMENTS, DEFAULT_TALENT_KEYWORDS,
};
use crate::parser::extract::classify::Weights;
use crate::parser::extract::requirements::SentenceRules;
use crate::parser::ContentLimits;

const DEFAULT_CONFIG_FILE: &str = "talent.toml";
const ENV_PREFIX: &str = "TALENT";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_SEEDS: &[&str] = &[
    "https://www.xuhui.gov.cn/zcfg/",
    "https://www.xuhui.gov.cn/zcfg/sfxwj/",
    "https://www.xuhui.gov.cn/zcfg/qfxwj/",
    "https://www.xuhui.gov.cn/xxgk/portal/article/organizationArticle?code=xhxxgk_wbj_zcwj",
    "https://www.xuhui.gov.cn/renshebao/",
    "https://www.xuhui.gov.cn/xxgk/portal/article/organizationArticle?code=xhxxgk_wbj_rshbj",
    "https://www.xuhui.gov.cn/fangtuju/",
    "https://www.xuhui.gov.cn/xxgk/portal/article/organizationArticle?code=xhxxgk_wbj_zfbzj",
    "https://www.xuhui.gov.cn/kejiju/",
    "https://www.xuhui.gov.cn/xxgk/portal/article/organizationArticle?code=xhxxgk_wbj_kjw",
    "https://www.xuhui.gov.cn/jiaoyu/",
    "https://www.xuhui.gov.cn/xxgk/portal/article/organizationArticle?code=xhxxgk_wbj_jyj",
    "https://www.xuhui.gov.cn/xxgk/portal/article/organizationArticle?code=xhxxgk_wbj_fgw",
    "https://www.xuhui.gov.cn/xxgk/portal/article/organizationArticle?code=xhxxgk_wbj_sww",
    "https://www.xuhui.gov.cn/tzgg/",
    "https://www.xuhui.gov.cn/xxgk/portal/article/organizationArticle?code=xhxxgk_wbj_gggs",
    "https://www.xuhui.gov.cn/ztlm/",
    "https://www.xuhui.gov.cn/zdly/",
    "https://www.xuhui.gov.cn/xgybgs/",
    "https://www.xuhui.gov.cn/xxgk/portal/article/organizationArticle?code=xhxxgk_wbj_xgybgs",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Listing pages links are discovered from.
    pub seeds: Vec<String>,
    /// Domain counted as the official source during verification.
    pub site_domain: String,
    pub fetch: FetchSettings,
    pub engine: EngineSettings,
    pub dictionaries: Dictionaries,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub verify_timeout_secs: u64,
    pub concurrency: usize,
    pub verify_concurrency: usize,
    /// Cap on detail pages fetched per crawl.
    pub max_details: usize,
    /// Responses smaller than this are treated as failures.
    pub min_page_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub title_weight: u32,
    pub body_weight: u32,
    pub default_category: String,
    pub min_sentence_chars: usize,
    pub max_sentence_chars: usize,
    pub max_per_label: usize,
    /// Pages whose body is not longer than this are dropped.
    pub min_content_chars: usize,
    /// Body text is truncated to this many chars.
    pub max_content_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Dictionaries {
    pub categories: KeywordDictionary,
    pub requirements: KeywordDictionary,
    pub talent_keywords: Vec<String>,
    pub company_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub db_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seeds: DEFAULT_SEEDS.iter().map(|s| s.to_string()).collect(),
            site_domain: "xuhui.gov.cn".to_string(),
            fetch: FetchSettings::default(),
            engine: EngineSettings::default(),
            dictionaries: Dictionaries::default(),
            output: OutputSettings::default(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            timeout_secs: 15,
            verify_timeout_secs: 10,
            concurrency: 3,
            verify_concurrency: 5,
            max_details: 80,
            min_page_bytes: 500,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            title_weight: 3,
            body_weight: 1,
            default_category: DEFAULT_CATEGORY.to_string(),
            min_sentence_chars: 10,
            max_sentence_chars: 500,
            max_per_label: 5,
            min_content_chars: 200,
            max_content_chars: 8000,
        }
    }
}

impl Default for Dictionaries {
    fn default() -> Self {
        Self {
            categories: KeywordDictionary::from_table(DEFAULT_CATEGORIES),
            requirements: KeywordDictionary::from_table(DEFAULT_REQUIREMENTS),
            talent_keywords: DEFAULT_TALENT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            company_keywords: DEFAULT_COMPANY_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            db_path: PathBuf::from("data/talent.sqlite"),
        }
    }
}

impl EngineSettings {
    pub fn weights(&self) -> Weights {
        Weights {
            title: self.title_weight,
            body: self.body_weight,
        }
    }

    pub fn sentence_rules(&self) -> SentenceRules {
        SentenceRules {
            min_chars: self.min_sentence_chars,
            max_chars: self.max_sentence_chars,
            max_per_label: self.max_per_label,
        }
    }

    pub fn content_limits(&self) -> ContentLimits {
        ContentLimits {
            min_chars: self.min_content_chars,
            max_chars: self.max_content_chars,
        }
    }
}

impl Settings {
    /// Defaults, then the TOML file (explicit path must exist, `talent.toml`
    /// is optional), then `TALENT_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&Settings::default())
            .context("Failed to serialise default settings")?;

        let file = match path {
            Some(p) => File::from(p).format(FileFormat::Toml).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE)
                .format(FileFormat::Toml)
                .required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        debug!(seeds = settings.seeds.len(), "settings loaded");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.dictionaries;
        ensure!(!d.categories.is_empty(), "category dictionary is empty");
        ensure!(!d.requirements.is_empty(), "requirement dictionary is empty");
        if let Some(label) = d.categories.duplicate_label() {
            anyhow::bail!("duplicate category label: {}", label);
        }
        if let Some(label) = d.requirements.duplicate_label() {
            anyhow::bail!("duplicate requirement label: {}", label);
        }
        ensure!(
            !d.categories.contains_label(&self.engine.default_category),
            "default category {:?} collides with a dictionary label",
            self.engine.default_category
        );

        let e = &self.engine;
        ensure!(
            e.min_sentence_chars < e.max_sentence_chars,
            "min_sentence_chars must be below max_sentence_chars"
        );
        ensure!(e.max_per_label > 0, "max_per_label must be at least 1");
        ensure!(
            e.min_content_chars < e.max_content_chars,
            "min_content_chars must be below max_content_chars"
        );
        ensure!(self.fetch.concurrency > 0, "fetch.concurrency must be at least 1");
        ensure!(
            self.fetch.verify_concurrency > 0,
            "fetch.verify_concurrency must be at least 1"
        );
        Ok(())
    }

    /// True when a link title looks like a talent-policy announcement.
    pub fn is_talent_related(&self, title: &str) -> bool {
        let d = &self.dictionaries;
        d.talent_keywords.iter().any(|k| title.contains(k.as_str()))
            || d.company_keywords.iter().any(|k| title.contains(k.as_str()))
            || crate::keywords::HINT_WORDS.iter().any(|k| title.contains(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        s.validate().unwrap();
        assert_eq!(s.engine.weights(), Weights { title: 3, body: 1 });
        assert_eq!(s.fetch.concurrency, 3);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("talent-test-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
seeds = ["https://example.gov.cn/list/"]

[engine]
title_weight = 5
max_per_label = 3

[[dictionaries.categories]]
label = "住房保障"
keywords = ["人才公寓"]

[[dictionaries.categories]]
label = "人才引进"
keywords = ["人才引进"]
"#,
        )
        .unwrap();

        let s = Settings::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(s.seeds, vec!["https://example.gov.cn/list/"]);
        assert_eq!(s.engine.title_weight, 5);
        assert_eq!(s.engine.body_weight, 1);
        assert_eq!(s.engine.max_per_label, 3);
        let labels: Vec<&str> = s.dictionaries.categories.labels().collect();
        assert_eq!(labels, vec!["住房保障", "人才引进"]);
        // untouched tables keep their defaults
        assert_eq!(s.dictionaries.requirements.len(), 5);
    }

    #[test]
    fn environment_overrides_file() {
        let path = std::env::temp_dir().join(format!("talent-env-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[fetch]
concurrency = 2
max_details = 10
"#,
        )
        .unwrap();

        // No other test reads these keys.
        std::env::set_var("TALENT_FETCH__CONCURRENCY", "7");
        std::env::set_var("TALENT_FETCH__MAX_DETAILS", "42");
        let loaded = Settings::load(Some(&path));
        std::env::remove_var("TALENT_FETCH__CONCURRENCY");
        std::env::remove_var("TALENT_FETCH__MAX_DETAILS");
        std::fs::remove_file(&path).ok();

        let s = loaded.unwrap();
        assert_eq!(s.fetch.concurrency, 7);
        assert_eq!(s.fetch.max_details, 42);
        assert_eq!(s.fetch.verify_concurrency, 5);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join("talent-definitely-missing.toml");
        assert!(Settings::load(Some(&path)).is_err());
    }

    #[test]
    fn rejects_bad_sentence_bounds() {
        let mut s = Settings::default();
        s.engine.min_sentence_chars = 600;
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_default_label_collision() {
        let mut s = Settings::default();
        s.engine.default_category = "人才引进".into();
        assert!(s.validate().is_err());
    }

    #[test]
    fn talent_related_titles() {
        let s = Settings::default();
        assert!(s.is_talent_related("关于做好2024年度人才公寓申请工作的通知"));
        assert!(s.is_talent_related("高新技术企业认定申报条件"));
        assert!(!s.is_talent_related("区政府常务会议召开"));
    }
}
