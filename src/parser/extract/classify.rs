use crate::keywords::CategoryDictionary;

/// Points per keyword present in the title / body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weights {
    pub title: u32,
    pub body: u32,
}

impl Default for Weights {
    fn default() -> Self {
        Self { title: 3, body: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryScore<'a> {
    pub label: &'a str,
    pub score: u32,
}

fn weighted(weight: u32, hits: usize) -> u32 {
    weight.saturating_mul(u32::try_from(hits).unwrap_or(u32::MAX))
}

/// Score every category, in dictionary order.
pub fn scores<'a>(
    title: &str,
    body: &str,
    dictionary: &'a CategoryDictionary,
    weights: Weights,
) -> Vec<CategoryScore<'a>> {
    dictionary
        .iter()
        .map(|set| CategoryScore {
            label: set.label.as_str(),
            score: weighted(weights.title, set.hits(title))
                .saturating_add(weighted(weights.body, set.hits(body))),
        })
        .collect()
}

/// Highest-scoring category; the earliest entry wins a tie. Falls back to
/// `default_label` when nothing scores.
pub fn classify<'a>(
    title: &str,
    body: &str,
    dictionary: &'a CategoryDictionary,
    weights: Weights,
    default_label: &'a str,
) -> &'a str {
    let mut best: Option<CategoryScore<'a>> = None;
    for s in scores(title, body, dictionary, weights) {
        if s.score > best.as_ref().map_or(0, |b| b.score) {
            best = Some(s);
        }
    }
    best.map_or(default_label, |b| b.label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::{KeywordDictionary, DEFAULT_CATEGORIES, DEFAULT_CATEGORY};

    fn defaults() -> KeywordDictionary {
        KeywordDictionary::from_table(DEFAULT_CATEGORIES)
    }

    #[test]
    fn nothing_matches_gives_default() {
        let dict = defaults();
        let c = classify("区政府常务会议", "会议研究了若干事项", &dict, Weights::default(), DEFAULT_CATEGORY);
        assert_eq!(c, "其他");
    }

    #[test]
    fn title_match_outweighs_body_mentions() {
        let dict = defaults();
        // 人才引进 in the title scores 3; two housing keywords in the body score 2
        let c = classify(
            "徐汇区人才引进实施办法",
            "符合条件的可申请人才公寓或住房补贴",
            &dict,
            Weights::default(),
            DEFAULT_CATEGORY,
        );
        assert_eq!(c, "人才引进");
    }

    #[test]
    fn keyword_counted_once_per_field() {
        let dict = defaults();
        let table = scores("", "落户落户落户落户", &dict, Weights::default());
        let settle = table.iter().find(|s| s.label == "落户服务").unwrap();
        assert_eq!(settle.score, 1);
    }

    #[test]
    fn keyword_in_both_fields_scores_both_weights() {
        let dict = defaults();
        let table = scores("人才公寓申请", "人才公寓位于徐汇区", &dict, Weights::default());
        let housing = table.iter().find(|s| s.label == "住房保障").unwrap();
        assert_eq!(housing.score, 4);
    }

    #[test]
    fn tie_goes_to_dictionary_order() {
        let dict = KeywordDictionary::from_table(&[("甲", &["苹果"]), ("乙", &["香蕉"])]);
        let c = classify("", "苹果和香蕉", &dict, Weights::default(), "其他");
        assert_eq!(c, "甲");

        let swapped = KeywordDictionary::from_table(&[("乙", &["香蕉"]), ("甲", &["苹果"])]);
        let c = classify("", "苹果和香蕉", &swapped, Weights::default(), "其他");
        assert_eq!(c, "乙");
    }

    #[test]
    fn winner_scores_at_least_every_other_category() {
        let dict = defaults();
        let title = "关于人才公寓和子女入学的通知";
        let body = "落户、户籍、居住证办理；体检与就医服务；创业孵化基金";
        let winner = classify(title, body, &dict, Weights::default(), DEFAULT_CATEGORY);
        let table = scores(title, body, &dict, Weights::default());
        let top = table.iter().find(|s| s.label == winner).unwrap().score;
        assert!(table.iter().all(|s| s.score <= top));
    }

    #[test]
    fn huge_weights_saturate() {
        let dict = defaults();
        let heavy = Weights { title: u32::MAX, body: u32::MAX };
        let table = scores("人才引进与高层次人才", "人才引进", &dict, heavy);
        let talent = table.iter().find(|s| s.label == "人才引进").unwrap();
        assert_eq!(talent.score, u32::MAX);
        assert_eq!(classify("人才引进与高层次人才", "", &dict, heavy, DEFAULT_CATEGORY), "人才引进");
    }

    #[test]
    fn weights_are_tunable() {
        let dict = defaults();
        let title = "徐汇区人才引进实施办法";
        let body = "符合条件的可申请人才公寓或住房补贴";
        let flat = Weights { title: 1, body: 1 };
        // 1 vs 2 once titles stop counting triple
        assert_eq!(classify(title, body, &dict, flat, DEFAULT_CATEGORY), "住房保障");
    }
}
