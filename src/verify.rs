use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::fetch::{self, FetchError, Fetcher, Probe};
use crate::report::UTF8_BOM;

pub const JSON_FILE: &str = "url_verification_results.json";
pub const CSV_FILE: &str = "url_verification_results.csv";
pub const MARKDOWN_FILE: &str = "url_verification_report.md";

// ── Scoring ──

const POLICY_TERMS: &[&str] = &["申报", "支持", "补贴", "奖励", "资助", "政策", "条件", "要求"];
const MONEY_TERMS: &[&str] = &["万元", "亿元", "百万"];
const TALENT_TERMS: &[&str] = &["人才", "博士", "硕士", "专家", "引进"];
const AI_TERMS: &[&str] = &["人工智能", "ai", "算法", "大模型", "智能"];
const CONTENT_MARKERS: &[&str] = &["徐汇", "政策", "申报", "支持", "补贴", "人才", "企业"];

const MAX_SCORE: u32 = 100;

fn count_present(text: &str, terms: &[&str]) -> u32 {
    terms.iter().filter(|t| text.contains(*t)).count() as u32
}

/// 0–100. `content` is expected lowercased so `ai` matches any case.
pub fn quality_score(content: &str, url: &str, site_domain: &str) -> u32 {
    let mut score = 0;
    if url.contains(site_domain) {
        score += 20;
    }
    score += 5 * count_present(content, POLICY_TERMS);
    if MONEY_TERMS.iter().any(|t| content.contains(t)) {
        score += 10;
    }
    score += 3 * count_present(content, TALENT_TERMS);
    score += 3 * count_present(content, AI_TERMS);
    score.min(MAX_SCORE)
}

pub fn has_policy_content(content: &str) -> bool {
    CONTENT_MARKERS.iter().any(|t| content.contains(t))
}

// ── Targets ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyTarget {
    pub url: String,
    pub title: String,
}

#[derive(Deserialize)]
struct ExportFile {
    #[serde(default)]
    policies: Vec<ExportEntry>,
}

#[derive(Deserialize)]
struct ExportEntry {
    url: Option<String>,
    #[serde(default)]
    title: String,
}

/// URLs from a previously exported `talent_policies.json`. Entries without
/// a URL are skipped.
pub fn parse_targets(json: &str) -> Result<Vec<VerifyTarget>> {
    let file: ExportFile = serde_json::from_str(json).context("Malformed policy export")?;
    Ok(file
        .policies
        .into_iter()
        .filter_map(|p| {
            Some(VerifyTarget {
                url: p.url?,
                title: p.title,
            })
        })
        .collect())
}

pub fn load_targets(path: &Path) -> Result<Vec<VerifyTarget>> {
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_targets(&json)
}

/// Known pages used when no export is supplied.
pub fn sample_targets() -> Vec<VerifyTarget> {
    [
        (
            "https://www.xuhui.gov.cn/xxgk/portal/article/detail?id=8a4c0c0692292eab0194a6f4d71614b0",
            "徐汇区关于推动人工智能产业高质量发展的若干意见",
        ),
        (
            "https://www.xuhui.gov.cn/xxgk/portal/article/detail?id=8a4c0c0692292eab0194a6f27fb814ac",
            "徐汇区关于推动具身智能产业发展的若干意见",
        ),
        (
            "https://www.xuhui.gov.cn/xxgk/portal/article/detail?id=8a4c0c0692292eab019384dc95a70aed",
            "关于支持上海市生成式人工智能创新生态先导区的若干措施",
        ),
        (
            "https://www.xuhui.gov.cn/xxgk/portal/article/organizationArticle?code=xhxxgk_wbj_kjw&page=1",
            "徐汇区科委政策列表页面",
        ),
        ("https://www.xuhui.gov.cn", "徐汇区政府官网首页"),
    ]
    .iter()
    .map(|(url, title)| VerifyTarget {
        url: url.to_string(),
        title: title.to_string(),
    })
    .collect()
}

// ── Verification ──

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub url: String,
    pub policy_title: String,
    pub status_code: u16,
    pub is_valid: bool,
    pub content_length: usize,
    pub verification_time: DateTime<Local>,
    pub error: Option<String>,
    pub is_official_domain: bool,
    pub has_policy_content: bool,
    pub quality_score: u32,
}

/// Turn one probe outcome into a result row. Only HTTP 200 counts as valid.
pub fn assess(
    target: &VerifyTarget,
    outcome: Result<Probe, FetchError>,
    site_domain: &str,
    at: DateTime<Local>,
) -> VerificationResult {
    let is_official_domain = target.url.contains(site_domain);
    let mut result = VerificationResult {
        url: target.url.clone(),
        policy_title: target.title.clone(),
        status_code: 0,
        is_valid: false,
        content_length: 0,
        verification_time: at,
        error: None,
        is_official_domain,
        has_policy_content: false,
        quality_score: 0,
    };

    match outcome {
        Ok(probe) => {
            result.status_code = probe.status;
            result.content_length = probe.bytes;
            if probe.status == 200 {
                let content = probe.text.to_lowercase();
                result.is_valid = true;
                result.has_policy_content = has_policy_content(&content);
                result.quality_score = quality_score(&content, &target.url, site_domain);
            } else {
                result.error = Some(format!("HTTP {}", probe.status));
            }
        }
        Err(e) => result.error = Some(e.to_string()),
    }
    result
}

/// Probe every target with a bounded worker pool. Output is in completion order.
pub async fn verify_urls(
    fetcher: Arc<Fetcher>,
    targets: Vec<VerifyTarget>,
    concurrency: usize,
    site_domain: &str,
) -> Vec<VerificationResult> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let domain: Arc<str> = Arc::from(site_domain);
    let pb = fetch::progress_bar(targets.len());
    let (tx, mut rx) = tokio::sync::mpsc::channel::<VerificationResult>(concurrency.max(1) * 2);

    for target in targets {
        let fetcher = Arc::clone(&fetcher);
        let sem = Arc::clone(&semaphore);
        let domain = Arc::clone(&domain);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let outcome = fetcher.probe(&target.url).await;
            let result = assess(&target, outcome, &domain, Local::now());
            match &result.error {
                None => info!(url = %result.url, score = result.quality_score, "valid"),
                Some(e) => warn!(url = %result.url, "invalid: {}", e),
            }
            let _ = tx.send(result).await;
        });
    }
    drop(tx);

    let mut results = Vec::new();
    while let Some(r) = rx.recv().await {
        results.push(r);
        pb.inc(1);
    }
    pb.finish_and_clear();
    results
}

// ── Reports ──

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifySummary {
    pub total_urls: usize,
    pub valid_urls: usize,
    pub invalid_urls: usize,
    pub success_rate: f64,
    pub average_quality_score: f64,
}

pub fn summarize(results: &[VerificationResult]) -> VerifySummary {
    let total = results.len();
    let valid: Vec<&VerificationResult> = results.iter().filter(|r| r.is_valid).collect();
    let pct = |n: usize| if total == 0 { 0.0 } else { n as f64 / total as f64 * 100.0 };
    let average = if valid.is_empty() {
        0.0
    } else {
        valid.iter().map(|r| r.quality_score as f64).sum::<f64>() / valid.len() as f64
    };
    VerifySummary {
        total_urls: total,
        valid_urls: valid.len(),
        invalid_urls: total - valid.len(),
        success_rate: pct(valid.len()),
        average_quality_score: average,
    }
}

struct MarkdownReport<'a> {
    results: &'a [VerificationResult],
    summary: &'a VerifySummary,
    at: DateTime<Local>,
}

impl fmt::Display for MarkdownReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_markdown(f, self.results, self.summary, self.at)
    }
}

pub fn render_markdown(results: &[VerificationResult], summary: &VerifySummary, at: DateTime<Local>) -> String {
    MarkdownReport { results, summary, at }.to_string()
}

fn write_markdown(
    out: &mut impl fmt::Write,
    results: &[VerificationResult],
    s: &VerifySummary,
    at: DateTime<Local>,
) -> fmt::Result {
    let pct = |n: usize| if s.total_urls == 0 { 0.0 } else { n as f64 / s.total_urls as f64 * 100.0 };

    writeln!(out, "# 徐汇区政策URL验证报告\n")?;
    writeln!(out, "## 验证概览")?;
    writeln!(out, "- **验证时间**: {}", at.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "- **总URL数量**: {}", s.total_urls)?;
    writeln!(out, "- **有效URL数量**: {} ({:.1}%)", s.valid_urls, pct(s.valid_urls))?;
    writeln!(out, "- **失效URL数量**: {} ({:.1}%)", s.invalid_urls, pct(s.invalid_urls))?;
    writeln!(out, "- **平均质量评分**: {:.1}/100\n", s.average_quality_score)?;

    writeln!(out, "## 验证结果详情\n")?;
    writeln!(out, "### 有效URL ({}个)", s.valid_urls)?;
    for (i, r) in results.iter().filter(|r| r.is_valid).enumerate() {
        writeln!(out, "\n**{}. {}**", i + 1, r.policy_title)?;
        writeln!(out, "- URL: {}", r.url)?;
        writeln!(out, "- 状态码: {}", r.status_code)?;
        writeln!(out, "- 内容长度: {} 字节", r.content_length)?;
        writeln!(out, "- 质量评分: {}/100", r.quality_score)?;
        writeln!(out, "- 验证时间: {}", r.verification_time.to_rfc3339())?;
    }

    if s.invalid_urls > 0 {
        writeln!(out, "\n### 失效URL ({}个)", s.invalid_urls)?;
        for (i, r) in results.iter().filter(|r| !r.is_valid).enumerate() {
            writeln!(out, "\n**{}. {}**", i + 1, r.policy_title)?;
            writeln!(out, "- URL: {}", r.url)?;
            writeln!(out, "- 错误信息: {}", r.error.as_deref().unwrap_or_default())?;
            writeln!(out, "- 验证时间: {}", r.verification_time.to_rfc3339())?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonExport<'a> {
    verification_time: DateTime<Local>,
    summary: &'a VerifySummary,
    results: &'a [VerificationResult],
}

pub fn write_csv<W: Write>(mut out: W, results: &[VerificationResult]) -> Result<()> {
    out.write_all(UTF8_BOM)?;
    let mut wtr = csv::Writer::from_writer(out);
    for r in results {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Markdown report, JSON and CSV into `dir`. Valid results are listed first.
pub fn write_reports(dir: &Path, results: &[VerificationResult]) -> Result<(VerifySummary, Vec<PathBuf>)> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let now = Local::now();
    let summary = summarize(results);

    let mut ordered: Vec<VerificationResult> = results.to_vec();
    ordered.sort_by_key(|r| !r.is_valid);

    let md_path = dir.join(MARKDOWN_FILE);
    fs::write(&md_path, render_markdown(&ordered, &summary, now))
        .with_context(|| format!("Failed to write {}", md_path.display()))?;

    let json_path = dir.join(JSON_FILE);
    let file = File::create(&json_path)
        .with_context(|| format!("Failed to create {}", json_path.display()))?;
    serde_json::to_writer_pretty(
        file,
        &JsonExport {
            verification_time: now,
            summary: &summary,
            results: &ordered,
        },
    )?;

    let csv_path = dir.join(CSV_FILE);
    let file = File::create(&csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;
    write_csv(file, &ordered)?;

    Ok((summary, vec![md_path, json_path, csv_path]))
}
