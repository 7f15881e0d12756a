use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;

pub const MEMORY_GAUGE: &str = "memory_usage_mb";
pub const CPU_GAUGE: &str = "cpu_usage_percent";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub memory_mb: f64,
    pub cpu_percent: f64,
}

/// 백엔드 자원 사용량 조회
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    async fn sample(&self) -> anyhow::Result<ResourceUsage>;
}

/// 측정 수단이 없을 때. 항상 0 을 돌려준다.
pub struct NullProbe;

#[async_trait]
impl ResourceProbe for NullProbe {
    async fn sample(&self) -> anyhow::Result<ResourceUsage> {
        Ok(ResourceUsage::default())
    }
}

/// Reads backend memory and CPU gauges from a Prometheus text endpoint.
pub struct PrometheusProbe {
    url: String,
    client: reqwest::Client,
}

impl PrometheusProbe {
    /// 응답이 없는 엔드포인트에 묶이지 않도록 요청마다 `timeout` 을 건다.
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ResourceProbe for PrometheusProbe {
    async fn sample(&self) -> anyhow::Result<ResourceUsage> {
        let scrape = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        usage_from_scrape(&scrape)
    }
}

pub fn usage_from_scrape(scrape: &str) -> anyhow::Result<ResourceUsage> {
    let memory_mb = parse_gauge(scrape, MEMORY_GAUGE)
        .ok_or_else(|| anyhow::anyhow!("gauge `{}` not found", MEMORY_GAUGE))?;
    let cpu_percent = parse_gauge(scrape, CPU_GAUGE)
        .ok_or_else(|| anyhow::anyhow!("gauge `{}` not found", CPU_GAUGE))?;
    Ok(ResourceUsage {
        memory_mb,
        cpu_percent,
    })
}

/// 라벨 유무와 상관없이 이름이 일치하는 첫 샘플 값
pub fn parse_gauge(scrape: &str, metric_name: &str) -> Option<f64> {
    let re = Regex::new(&format!(
        r"^{}(\{{[^}}]*\}})?\s+(?P<value>[-+0-9\.eE]+|NaN)(\s+\d+)?$",
        regex::escape(metric_name)
    ))
    .ok()?;

    scrape
        .lines()
        .filter_map(|line| re.captures(line.trim()))
        .find_map(|caps| caps.name("value")?.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRAPE: &str = r#"
# HELP memory_usage_mb Resident memory
# TYPE memory_usage_mb gauge
memory_usage_mb 734.5
# HELP cpu_usage_percent CPU usage
# TYPE cpu_usage_percent gauge
cpu_usage_percent{host="a"} 41
memory_usage_mb_peak 900
"#;

    #[test]
    fn test_parse_gauge_plain_and_labeled() {
        assert_eq!(parse_gauge(SCRAPE, "memory_usage_mb"), Some(734.5));
        assert_eq!(parse_gauge(SCRAPE, "cpu_usage_percent"), Some(41.0));
        assert_eq!(parse_gauge(SCRAPE, "memory_usage_mb_peak"), Some(900.0));
        assert_eq!(parse_gauge(SCRAPE, "missing_gauge"), None);
    }

    #[test]
    fn test_usage_from_scrape() {
        let usage = usage_from_scrape(SCRAPE).unwrap();
        assert_eq!(
            usage,
            ResourceUsage {
                memory_mb: 734.5,
                cpu_percent: 41.0
            }
        );
        assert!(usage_from_scrape("memory_usage_mb 1").is_err());
    }

    #[actix_web::test]
    async fn test_null_probe_reports_zero() {
        assert_eq!(NullProbe.sample().await.unwrap(), ResourceUsage::default());
    }
}
