pub mod classify;
pub mod fields;
pub mod requirements;

use chrono::Local;

use crate::config::Settings;
use crate::keywords::{CategoryDictionary, RequirementDictionary};
use crate::record::PolicyRecord;
use classify::{CategoryScore, Weights};
use requirements::SentenceRules;

/// Field extraction, classification and requirement extraction over one
/// page's text. Holds only read-only configuration, so one instance can be
/// shared across worker threads.
#[derive(Debug, Clone)]
pub struct Engine {
    categories: CategoryDictionary,
    requirements: RequirementDictionary,
    weights: Weights,
    rules: SentenceRules,
    default_category: String,
}

impl Engine {
    pub fn new(
        categories: CategoryDictionary,
        requirements: RequirementDictionary,
        weights: Weights,
        rules: SentenceRules,
        default_category: impl Into<String>,
    ) -> Self {
        Self {
            categories,
            requirements,
            weights,
            rules,
            default_category: default_category.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.dictionaries.categories.clone(),
            settings.dictionaries.requirements.clone(),
            settings.engine.weights(),
            settings.engine.sentence_rules(),
            settings.engine.default_category.clone(),
        )
    }

    pub fn requirement_labels(&self) -> impl Iterator<Item = &str> {
        self.requirements.labels()
    }

    pub fn classify(&self, title: &str, body: &str) -> &str {
        classify::classify(title, body, &self.categories, self.weights, &self.default_category)
    }

    pub fn category_scores(&self, title: &str, body: &str) -> Vec<CategoryScore<'_>> {
        classify::scores(title, body, &self.categories, self.weights)
    }

    /// text → fields → category → requirements → record.
    pub fn extract(&self, url: &str, title: &str, body: &str) -> PolicyRecord {
        let fields = fields::extract(title, body);
        let category = self.classify(title, body);
        let reqs = requirements::extract_requirements(title, body, &self.requirements, self.rules);

        PolicyRecord::builder(url, title, body)
            .fields(fields)
            .category(category)
            .requirements(reqs)
            .crawl_time(Local::now())
            .build()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE: &str = "徐汇区人才引进实施办法";
    const BODY: &str =
        "学历要求为博士及以上，注册资本不低于500万元。申报材料包括身份证明和学历证明。";

    #[test]
    fn worked_example_record() {
        let engine = Engine::default();
        let r = engine.extract("https://www.xuhui.gov.cn/a", TITLE, BODY);
        assert_eq!(r.category(), "人才引进");
        assert!(r.requirement("企业基本条件").contains("注册资本不低于500万元"));
        assert_eq!(r.requirement("申报材料"), "申报材料包括身份证明和学历证明");
        assert_eq!(r.raw_text(), BODY);
        assert_eq!(r.url(), "https://www.xuhui.gov.cn/a");
    }

    #[test]
    fn record_keys_match_requirement_dictionary() {
        let engine = Engine::default();
        let r = engine.extract("u", "无关标题", "无关内容");
        let keys: Vec<&str> = r.requirements().keys().map(String::as_str).collect();
        let labels: Vec<&str> = engine.requirement_labels().collect();
        assert_eq!(keys, labels);
        assert_eq!(r.category(), "其他");
    }

    #[test]
    fn category_is_a_label_or_default() {
        let settings = Settings::default();
        let engine = Engine::from_settings(&settings);
        for (title, body) in [
            (TITLE, BODY),
            ("人才公寓", ""),
            ("", "子女入学政策"),
            ("会议", "纪要"),
        ] {
            let c = engine.classify(title, body);
            assert!(
                settings.dictionaries.categories.contains_label(c) || c == "其他",
                "unexpected category {c}"
            );
        }
    }

    #[test]
    fn date_and_department_flow_into_record() {
        let engine = Engine::default();
        let body = "发布机构：徐汇区人力资源和社会保障局\n发布时间：2024-05-20\n为进一步做好人才公寓配租工作。";
        let r = engine.extract("u", "人才公寓配租通知", body);
        assert_eq!(r.publish_date(), Some("2024-05-20"));
        assert_eq!(r.department(), Some("徐汇区人力资源和社会保障局"));
        assert_eq!(r.category(), "住房保障");
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}
