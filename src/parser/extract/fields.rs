use std::sync::LazyLock;

use regex::Regex;

/// Labelled date first, then the bare date forms the site uses.
static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"发布时间[:：]\s*(\d{4}[-年]\d{1,2}[-月]\d{1,2}日?)",
        r"时间[:：]\s*(\d{4}[-年]\d{1,2}[-月]\d{1,2}日?)",
        r"(\d{4}[-年]\d{1,2}[-月]\d{1,2}日?)",
        r"(\d{4}/\d{1,2}/\d{1,2})",
        r"(\d{4}\.\d{1,2}\.\d{1,2})",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Labelled publisher first, then the shortest "徐汇区…局/委/办/中心/部/处" run.
static DEPARTMENT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"发布机构[:：]\s*([^，。；！？\n]+)",
        r"发布部门[:：]\s*([^，。；！？\n]+)",
        r"(徐汇区[^，。；！？\n]*?(?:局|委|办|中心|部|处))",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    pub publish_date: Option<String>,
    pub department: Option<String>,
}

/// Body is searched before the title, matching how the page text is laid out.
pub fn extract(title: &str, body: &str) -> Fields {
    let text = format!("{}{}", body, title);
    Fields {
        publish_date: extract_date(&text),
        department: extract_department(&text),
    }
}

pub fn extract_date(text: &str) -> Option<String> {
    first_capture(&DATE_PATTERNS, text)
}

pub fn extract_department(text: &str) -> Option<String> {
    first_capture(&DEPARTMENT_PATTERNS, text)
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labelled_date_wins_over_earlier_bare_date() {
        let text = "有效期至2026-12-31。发布时间：2024-03-15 来源：区人社局";
        assert_eq!(extract_date(text).as_deref(), Some("2024-03-15"));
    }

    #[test]
    fn bare_date_forms() {
        assert_eq!(extract_date("印发于2023年5月8日").as_deref(), Some("2023年5月8日"));
        assert_eq!(extract_date("日期 2023/05/08").as_deref(), Some("2023/05/08"));
        assert_eq!(extract_date("日期 2023.5.8").as_deref(), Some("2023.5.8"));
        assert_eq!(extract_date("2023-05-08").as_deref(), Some("2023-05-08"));
    }

    #[test]
    fn no_date_is_none() {
        assert_eq!(extract_date("没有任何日期信息"), None);
    }

    #[test]
    fn labelled_department() {
        let text = "发布机构： 徐汇区人力资源和社会保障局，发布时间：2024-01-02";
        assert_eq!(
            extract_department(text).as_deref(),
            Some("徐汇区人力资源和社会保障局")
        );
    }

    #[test]
    fn department_label_variants() {
        assert_eq!(
            extract_department("发布部门:区科委\n正文").as_deref(),
            Some("区科委")
        );
    }

    #[test]
    fn region_fallback_takes_shortest_unit() {
        let text = "为贯彻落实，上海市徐汇区科学技术委员会会同区财政局制定本办法。";
        assert_eq!(
            extract_department(text).as_deref(),
            Some("徐汇区科学技术委")
        );
        let text = "由徐汇区人才服务中心负责受理";
        assert_eq!(extract_department(text).as_deref(), Some("徐汇区人才服务中心"));
    }

    #[test]
    fn city_prefix_not_captured() {
        let with_city = extract_department("上海市徐汇区人力资源和社会保障局发布");
        let without = extract_department("徐汇区人力资源和社会保障局发布");
        assert_eq!(with_city, without);
        assert_eq!(with_city.as_deref(), Some("徐汇区人力资源和社会保障局"));
    }

    #[test]
    fn region_fallback_stops_at_punctuation() {
        assert_eq!(extract_department("徐汇区，欢迎您。请联系财政局"), None);
    }

    #[test]
    fn extract_searches_body_then_title() {
        let f = extract("2022-01-01 标题", "正文发布时间：2024-06-01");
        assert_eq!(f.publish_date.as_deref(), Some("2024-06-01"));
        let f = extract("徐汇区教育局关于入学的通知", "正文没有日期");
        assert_eq!(f.publish_date, None);
        assert_eq!(f.department.as_deref(), Some("徐汇区教育局"));
    }
}
