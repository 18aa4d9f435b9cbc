use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::Serialize;

use crate::record::PolicyRecord;

pub const JSON_FILE: &str = "talent_policies.json";
pub const CSV_FILE: &str = "talent_policies.csv";
pub const TEXT_FILE: &str = "talent_report.txt";

/// Written ahead of CSV output so spreadsheet tools pick up UTF-8.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const UNKNOWN_DEPARTMENT: &str = "未知";

const SUMMARY_CHARS: usize = 500;
const EXCERPT_CHARS: usize = 200;
const TOP_DEPARTMENTS: usize = 10;

/// Counts in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub categories: IndexMap<String, usize>,
    pub departments: IndexMap<String, usize>,
}

pub fn summarize(records: &[PolicyRecord]) -> Summary {
    let mut summary = Summary {
        total: records.len(),
        ..Summary::default()
    };
    for r in records {
        *summary.categories.entry(r.category().to_string()).or_default() += 1;
        let dept = r.department().unwrap_or(UNKNOWN_DEPARTMENT);
        *summary.departments.entry(dept.to_string()).or_default() += 1;
    }
    summary
}

/// Highest count first; ties keep first-seen order.
fn by_count(counts: &IndexMap<String, usize>) -> Vec<(&str, usize)> {
    let mut sorted: Vec<(&str, usize)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted
}

fn clip(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ── JSON ──

#[derive(Serialize)]
struct JsonExport<'a> {
    crawl_time: DateTime<Local>,
    total_policies: usize,
    categories: &'a IndexMap<String, usize>,
    departments: &'a IndexMap<String, usize>,
    policies: &'a [PolicyRecord],
}

pub fn write_json<W: Write>(
    out: W,
    records: &[PolicyRecord],
    summary: &Summary,
    at: DateTime<Local>,
) -> Result<()> {
    let export = JsonExport {
        crawl_time: at,
        total_policies: summary.total,
        categories: &summary.categories,
        departments: &summary.departments,
        policies: records,
    };
    serde_json::to_writer_pretty(out, &export)?;
    Ok(())
}

// ── CSV ──

/// One row per record. Requirement columns follow `labels`.
pub fn write_csv<W: Write>(mut out: W, records: &[PolicyRecord], labels: &[String]) -> Result<()> {
    out.write_all(UTF8_BOM)?;
    let mut wtr = csv::Writer::from_writer(out);

    let mut header = vec!["标题", "分类", "发布部门", "发布时间", "链接"];
    header.extend(labels.iter().map(String::as_str));
    header.push("内容摘要");
    wtr.write_record(&header)?;

    for r in records {
        let mut row = vec![
            r.title().to_string(),
            r.category().to_string(),
            r.department().unwrap_or_default().to_string(),
            r.publish_date().unwrap_or_default().to_string(),
            r.url().to_string(),
        ];
        row.extend(labels.iter().map(|l| r.requirement(l).to_string()));
        row.push(clip(r.raw_text(), SUMMARY_CHARS));
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

// ── Text report ──

struct TextReport<'a> {
    records: &'a [PolicyRecord],
    summary: &'a Summary,
    at: DateTime<Local>,
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_text(f, self.records, self.summary, self.at)
    }
}

pub fn render_text(records: &[PolicyRecord], summary: &Summary, at: DateTime<Local>) -> String {
    TextReport { records, summary, at }.to_string()
}

fn write_text(
    out: &mut impl fmt::Write,
    records: &[PolicyRecord],
    summary: &Summary,
    at: DateTime<Local>,
) -> fmt::Result {
    writeln!(out, "徐汇区企业人才政策综合报告")?;
    writeln!(out, "{}\n", "=".repeat(60))?;
    writeln!(out, "爬取时间: {}", at.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "总政策数量: {} 条\n", summary.total)?;

    writeln!(out, "政策分类分布:")?;
    for (cat, count) in by_count(&summary.categories) {
        let pct = count as f64 / summary.total.max(1) as f64 * 100.0;
        writeln!(out, "   {}: {}条 ({:.1}%)", cat, count, pct)?;
    }

    writeln!(out, "\n主要发布部门:")?;
    for (dept, count) in by_count(&summary.departments).into_iter().take(TOP_DEPARTMENTS) {
        if dept != UNKNOWN_DEPARTMENT {
            writeln!(out, "   {}: {}条", dept, count)?;
        }
    }

    writeln!(out, "\n\n详细政策列表:")?;
    writeln!(out, "{}", "-".repeat(80))?;
    for (i, r) in records.iter().enumerate() {
        writeln!(out, "\n{}. {}", i + 1, r.title())?;
        writeln!(out, "   分类: {}", r.category())?;
        writeln!(out, "   部门: {}", r.department().unwrap_or_default())?;
        writeln!(out, "   时间: {}", r.publish_date().unwrap_or_default())?;
        writeln!(out, "   链接: {}", r.url())?;
        for (label, excerpt) in r.requirements() {
            if !excerpt.trim().is_empty() {
                writeln!(out, "   【{}】: {}...", label, clip(excerpt, EXCERPT_CHARS))?;
            }
        }
        writeln!(out, "{}", "-".repeat(80))?;
    }
    Ok(())
}

/// Write JSON, CSV and the text report into `dir`. Returns the paths written.
pub fn export_all(dir: &Path, records: &[PolicyRecord], labels: &[String]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let now = Local::now();
    let summary = summarize(records);

    let json_path = dir.join(JSON_FILE);
    let file = File::create(&json_path)
        .with_context(|| format!("Failed to create {}", json_path.display()))?;
    write_json(file, records, &summary, now)?;

    let csv_path = dir.join(CSV_FILE);
    let file = File::create(&csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;
    write_csv(file, records, labels)?;

    let text_path = dir.join(TEXT_FILE);
    fs::write(&text_path, render_text(records, &summary, now))
        .with_context(|| format!("Failed to write {}", text_path.display()))?;

    Ok(vec![json_path, csv_path, text_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::extract::fields::Fields;

    fn record(title: &str, category: &str, dept: Option<&str>, req: &[(&str, &str)]) -> PolicyRecord {
        PolicyRecord::builder("https://www.xuhui.gov.cn/a", title, "正文内容")
            .fields(Fields {
                publish_date: Some("2024-05-20".into()),
                department: dept.map(String::from),
            })
            .category(category)
            .requirements(req.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
            .build()
    }

    fn sample() -> Vec<PolicyRecord> {
        vec![
            record("人才公寓配租通知", "住房保障", Some("徐汇区房管局"), &[("申报材料", "身份证明"), ("申报时间", "")]),
            record("人才引进办法", "人才引进", None, &[("申报材料", ""), ("申报时间", "")]),
            record("租房补贴申请", "住房保障", Some("徐汇区房管局"), &[("申报材料", ""), ("申报时间", "")]),
        ]
    }

    #[test]
    fn summary_counts() {
        let s = summarize(&sample());
        assert_eq!(s.total, 3);
        assert_eq!(s.categories["住房保障"], 2);
        assert_eq!(s.categories["人才引进"], 1);
        assert_eq!(s.departments["徐汇区房管局"], 2);
        assert_eq!(s.departments[UNKNOWN_DEPARTMENT], 1);
        let order: Vec<&str> = s.categories.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["住房保障", "人才引进"]);
    }

    #[test]
    fn csv_has_bom_and_requirement_columns() {
        let labels = vec!["申报材料".to_string(), "申报时间".to_string()];
        let mut buf = Vec::new();
        write_csv(&mut buf, &sample(), &labels).unwrap();

        assert!(buf.starts_with(UTF8_BOM));
        let text = String::from_utf8(buf[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "标题,分类,发布部门,发布时间,链接,申报材料,申报时间,内容摘要"
        );
        assert_eq!(
            lines.next().unwrap(),
            "人才公寓配租通知,住房保障,徐汇区房管局,2024-05-20,https://www.xuhui.gov.cn/a,身份证明,,正文内容"
        );
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn json_export_shape() {
        let records = sample();
        let summary = summarize(&records);
        let mut buf = Vec::new();
        write_json(&mut buf, &records, &summary, Local::now()).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(v["total_policies"], 3);
        assert_eq!(v["categories"]["住房保障"], 2);
        assert_eq!(v["policies"].as_array().unwrap().len(), 3);
        assert_eq!(v["policies"][0]["title"], "人才公寓配租通知");
    }

    #[test]
    fn text_report_sections() {
        let records = sample();
        let text = render_text(&records, &summarize(&records), Local::now());
        assert!(text.contains("总政策数量: 3 条"));
        assert!(text.contains("   住房保障: 2条 (66.7%)"));
        assert!(text.contains("   徐汇区房管局: 2条"));
        assert!(!text.contains("   未知: 1条"));
        assert!(text.contains("   【申报材料】: 身份证明..."));
        assert!(!text.contains("【申报时间】"));
    }

    #[test]
    fn excerpts_clipped() {
        let long = "条".repeat(300);
        let r = record("t", "其他", None, &[("支持标准", long.as_str())]);
        let text = render_text(std::slice::from_ref(&r), &summarize(std::slice::from_ref(&r)), Local::now());
        let line = text.lines().find(|l| l.contains("【支持标准】")).unwrap();
        assert_eq!(line.matches('条').count(), 200);
    }
}
