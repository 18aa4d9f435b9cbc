use serde::{Deserialize, Serialize};

/// Label used when no category keyword appears anywhere.
pub const DEFAULT_CATEGORY: &str = "其他";

/// Words that mark a page as talent-related even when no dictionary keyword hits.
pub const HINT_WORDS: &[&str] = &[
    "人才", "住房", "落户", "博士", "硕士", "专家", "引进", "补贴", "公寓",
];

/// One label and the substrings that trigger it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSet {
    pub label: String,
    pub keywords: Vec<String>,
}

impl KeywordSet {
    /// Number of distinct keywords present in `text`. Presence only.
    pub fn hits(&self, text: &str) -> usize {
        self.keywords
            .iter()
            .filter(|kw| !kw.is_empty() && text.contains(kw.as_str()))
            .count()
    }

    pub fn matches(&self, text: &str) -> bool {
        self.keywords
            .iter()
            .any(|kw| !kw.is_empty() && text.contains(kw.as_str()))
    }
}

/// Ordered label → keywords mapping. Order matters: classification ties go
/// to the earlier entry, and requirement maps follow it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordDictionary {
    entries: Vec<KeywordSet>,
}

pub type CategoryDictionary = KeywordDictionary;
pub type RequirementDictionary = KeywordDictionary;

impl KeywordDictionary {
    pub fn from_table(table: &[(&str, &[&str])]) -> Self {
        let entries = table
            .iter()
            .map(|(label, keywords)| KeywordSet {
                label: label.to_string(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            })
            .collect();
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeywordSet> {
        self.entries.iter()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.entries.iter().any(|e| e.label == label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First label that appears more than once, if any.
    pub fn duplicate_label(&self) -> Option<&str> {
        self.entries.iter().enumerate().find_map(|(i, e)| {
            self.entries[..i]
                .iter()
                .any(|prev| prev.label == e.label)
                .then_some(e.label.as_str())
        })
    }
}

// ── Built-in dictionaries ──

pub const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "人才引进",
        &[
            "人才引进", "人才招聘", "海外人才", "高层次人才", "领军人才",
            "专家引进", "博士引进", "硕士引进", "人才计划", "千人计划",
        ],
    ),
    (
        "住房保障",
        &[
            "住房补贴", "房屋补贴", "租房补贴", "人才公寓", "住房支持",
            "保障性住房", "公租房", "廉租房", "安居", "租金", "住房优惠",
        ],
    ),
    ("落户服务", &["落户", "户籍", "居住证", "积分", "迁户", "户口", "落户政策"]),
    ("子女教育", &["子女入学", "子女教育", "教育优惠", "入学", "学区", "择校"]),
    ("创业扶持", &["创业支持", "创业补贴", "创业孵化", "创业基金", "初创", "众创"]),
    (
        "资金资助",
        &["人才资助", "人才奖励", "科研资助", "项目资助", "津贴", "补助", "安家费"],
    ),
    ("医疗服务", &["医疗保障", "医疗服务", "健康", "体检", "医疗优惠", "就医"]),
];

pub const DEFAULT_REQUIREMENTS: &[(&str, &[&str])] = &[
    (
        "企业基本条件",
        &[
            "注册地", "注册资本", "实缴资本", "营业执照", "经营期限",
            "企业性质", "行业类别", "经营范围", "纳税", "信用记录",
            "高新技术企业", "专精特新", "规模以上企业", "上市公司",
        ],
    ),
    (
        "人才要求",
        &[
            "学历要求", "学位要求", "专业要求", "工作经验", "年龄限制",
            "技术职称", "专业技能", "海外经历", "获奖情况", "学术成果",
        ],
    ),
    (
        "申报材料",
        &[
            "申报表", "申请表", "身份证明", "学历证明", "工作证明",
            "推荐信", "简历", "业绩材料", "获奖证书", "专利证书",
        ],
    ),
    (
        "申报时间",
        &[
            "申报时间", "截止时间", "受理期间", "评审时间", "公示时间",
            "办理时限", "有效期", "年度申报", "常年受理",
        ],
    ),
    (
        "支持标准",
        &[
            "补贴标准", "奖励金额", "支持额度", "最高限额", "一次性",
            "按年度", "分期拨付", "配套资金", "专项资金",
        ],
    ),
];

pub const DEFAULT_TALENT_KEYWORDS: &[&str] = &[
    "人才政策", "人才服务", "人才计划", "人才工程", "人才项目",
    "人才引进", "人才招聘", "人才培养", "人才评价", "人才激励",
    "高层次人才", "领军人才", "拔尖人才", "骨干人才", "青年人才",
    "海外人才", "外籍人才", "国际人才", "留学人员", "海归",
    "博士", "硕士", "教授", "研究员", "高级工程师", "专家",
    "院士", "学者", "科学家", "技术人员", "研发人员",
    "千人计划", "万人计划", "杰青", "长江学者", "博士后",
    "优秀人才", "紧缺人才", "特殊人才", "创新人才", "创业人才",
    "人才公寓", "人才房", "住房补贴", "租房补贴", "购房补贴",
    "住房支持", "住房优惠", "安居工程", "保障性住房", "公租房",
    "廉租房", "租赁住房", "住房保障", "租金补贴", "房租补助",
    "人才落户", "直接落户", "落户政策", "户籍政策", "居住证",
    "积分落户", "居住证积分", "户口迁移", "户籍管理",
    "子女入学", "子女教育", "教育优惠", "入学政策", "择校",
    "教育服务", "学区", "国际学校", "优质教育资源",
    "医疗保障", "医疗服务", "健康服务", "配偶就业", "家属安置",
    "绿色通道", "一站式服务", "人才服务中心", "人才驿站",
    "人才资助", "人才补贴", "人才奖励", "创业补贴", "科研资助",
    "项目资助", "启动资金", "津贴", "安家费", "生活补贴",
    "企业人才", "用人单位", "人才引进企业", "雇主", "招聘单位",
];

pub const DEFAULT_COMPANY_KEYWORDS: &[&str] = &[
    "企业注册", "注册地", "注册资本", "营业执照", "经营期限",
    "企业性质", "行业类别", "经营范围", "纳税", "信用",
    "高新技术企业", "专精特新", "规模以上", "上市公司",
    "申报条件", "申请条件", "申报要求", "申报材料", "申报流程",
    "企业要求", "用人单位条件", "雇主条件", "招聘企业",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_order_is_preserved() {
        let dict = KeywordDictionary::from_table(DEFAULT_CATEGORIES);
        let labels: Vec<&str> = dict.labels().collect();
        assert_eq!(labels.first(), Some(&"人才引进"));
        assert_eq!(labels.last(), Some(&"医疗服务"));
        assert_eq!(dict.len(), 7);
    }

    #[test]
    fn hits_count_presence_not_occurrences() {
        let set = KeywordSet {
            label: "x".into(),
            keywords: vec!["落户".into(), "户籍".into()],
        };
        assert_eq!(set.hits("落户落户落户"), 1);
        assert_eq!(set.hits("落户与户籍"), 2);
        assert_eq!(set.hits("无关内容"), 0);
    }

    #[test]
    fn empty_keyword_never_matches() {
        let set = KeywordSet {
            label: "x".into(),
            keywords: vec![String::new()],
        };
        assert!(!set.matches("anything"));
    }

    #[test]
    fn duplicate_labels_detected() {
        let dict = KeywordDictionary::from_table(&[("a", &["1"]), ("b", &["2"]), ("a", &["3"])]);
        assert_eq!(dict.duplicate_label(), Some("a"));
        assert_eq!(KeywordDictionary::from_table(DEFAULT_REQUIREMENTS).duplicate_label(), None);
    }
}
