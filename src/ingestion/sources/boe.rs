//! # BOE (Boletín Oficial del Estado) Crawler
//!
//! ## Purpose
//! Fetches legislation and official dispositions from the Spanish official
//! gazette through its open-data API. The BOE publishes daily summaries of
//! organic laws, royal decrees, ministerial orders and administrative
//! resolutions from every ministry and state body.
//!
//! ## Input/Output Specification
//! - **Input**: Crawl date window, configured base URL
//! - **Output**: Raw records with BOE-A identifiers, titles, issuing
//!   departments and document URLs; full text is extracted later by the
//!   pipeline
//! - **Failure Behavior**: HTTP or schema errors log and yield an empty set

use super::{CrawlWindow, Crawler, RawRecord};
use crate::config::IngestionConfig;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

/// Crawler for the BOE open-data API
pub struct BoeCrawler {
    client: reqwest::Client,
    base_url: String,
}

impl BoeCrawler {
    pub fn new(base_url: impl Into<String>, config: &IngestionConfig) -> Result<Self> {
        let client =
            crate::clients::http_client(config.request_timeout_seconds, &config.user_agent)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Daily summary endpoint for a publication date
    fn summary_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/boe/dias/{}",
            self.base_url.trim_end_matches('/'),
            date.format("%Y/%m/%d")
        )
    }

    /// Walk the nested daily-summary JSON and collect disposition items.
    ///
    /// Summary structure: `sumario > diario[] > seccion[] > departamento[] >
    /// epigrafe[] > item[]`. Every level may be an object or an array, so
    /// the walk is defensive and collects whatever `item` nodes it finds.
    fn parse_summary(&self, summary: &Value, published: NaiveDate) -> Vec<RawRecord> {
        let mut records = Vec::new();
        let mut stack = vec![(summary, String::new(), String::new())];

        while let Some((node, department, heading)) = stack.pop() {
            match node {
                Value::Array(items) => {
                    for item in items {
                        stack.push((item, department.clone(), heading.clone()));
                    }
                }
                Value::Object(map) => {
                    for (key, child) in map {
                        match key.as_str() {
                            "item" => {
                                for item in Self::as_slice(child) {
                                    if let Some(record) =
                                        self.parse_item(item, &department, &heading, published)
                                    {
                                        records.push(record);
                                    }
                                }
                            }
                            "departamento" => {
                                for dep in Self::as_slice(child) {
                                    let name = Self::string_attr(dep, "nombre");
                                    stack.push((dep, name, heading.clone()));
                                }
                            }
                            "epigrafe" => {
                                for epi in Self::as_slice(child) {
                                    let name = Self::string_attr(epi, "nombre");
                                    stack.push((epi, department.clone(), name));
                                }
                            }
                            _ => {
                                if child.is_object() || child.is_array() {
                                    stack.push((child, department.clone(), heading.clone()));
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        records
    }

    fn as_slice(value: &Value) -> Vec<&Value> {
        match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    fn string_attr(node: &Value, key: &str) -> String {
        node.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    fn parse_item(
        &self,
        item: &Value,
        department: &str,
        heading: &str,
        published: NaiveDate,
    ) -> Option<RawRecord> {
        let external_ref = item
            .get("identificador")
            .or_else(|| item.get("id"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let title = Self::string_attr(item, "titulo");

        if external_ref.is_empty() || title.is_empty() {
            return None;
        }

        let url_html = item
            .get("url_html")
            .or_else(|| item.get("urlHtml"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let url_pdf = item
            .get("url_pdf")
            .or_else(|| item.get("urlPdf"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let original_url = Self::resolve_url(if url_html.is_empty() {
            url_pdf
        } else {
            url_html
        });

        Some(RawRecord {
            source_id: "boe".to_string(),
            external_ref,
            title,
            resolution_type: Self::map_rank_to_type(heading),
            issuing_body: department.to_string(),
            date_issued: Some(published),
            date_published: Some(published),
            original_url,
            // Full text is extracted later by the pipeline.
            full_text: String::new(),
            ..Default::default()
        })
    }

    /// Resolve relative BOE URLs against the gazette domain
    fn resolve_url(url: &str) -> String {
        if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        if url.starts_with('/') {
            format!("https://www.boe.es{}", url)
        } else {
            format!("https://www.boe.es/{}", url)
        }
    }

    /// Map the BOE normative rank to the system's resolution type.
    ///
    /// Order matters: more specific ranks must match before generic ones.
    fn map_rank_to_type(rank: &str) -> String {
        let rank = rank.to_lowercase();

        let mapped = if rank.contains("ley orgánica") || rank.contains("ley organica") {
            "ley_organica"
        } else if rank.contains("real decreto-ley") {
            "real_decreto_ley"
        } else if rank.contains("real decreto legislativo") {
            "real_decreto_legislativo"
        } else if rank.contains("real decreto") {
            "real_decreto"
        } else if rank.contains("ley") {
            "ley"
        } else if rank.contains("orden") {
            "orden_ministerial"
        } else if rank.contains("directiva") {
            "directiva"
        } else if rank.contains("reglamento") {
            "reglamento"
        } else if rank.contains("instrucción") || rank.contains("instruccion") {
            "instruccion"
        } else if rank.contains("circular") {
            "circular"
        } else if rank.contains("convenio") {
            "convenio"
        } else if rank.contains("acuerdo") {
            "acuerdo"
        } else if rank.contains("decreto") {
            "decreto"
        } else if rank.contains("resolución") || rank.contains("resolucion") {
            "resolucion"
        } else if rank.contains("corrección") || rank.contains("correccion") {
            "correccion_errores"
        } else if rank.contains("anuncio") {
            "anuncio"
        } else {
            "disposicion"
        };

        mapped.to_string()
    }
}

#[async_trait]
impl Crawler for BoeCrawler {
    fn source_id(&self) -> &str {
        "boe"
    }

    async fn crawl(&self, window: &CrawlWindow) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();
        let mut day = window.date_from;

        while day <= window.date_to {
            let url = self.summary_url(day);

            let response = match self
                .client
                .get(&url)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => response,
                Ok(response) => {
                    // Days without a gazette issue return 404; anything else
                    // is worth a log line.
                    if response.status() != reqwest::StatusCode::NOT_FOUND {
                        tracing::warn!(%url, status = %response.status(), "BOE summary request failed");
                    }
                    day += chrono::Duration::days(1);
                    continue;
                }
                Err(e) => {
                    tracing::error!(%url, error = %e, "BOE summary request errored");
                    day += chrono::Duration::days(1);
                    continue;
                }
            };

            match response.json::<Value>().await {
                Ok(summary) => {
                    let day_records = self.parse_summary(&summary, day);
                    records.extend(day_records);
                }
                Err(e) => {
                    tracing::warn!(%url, error = %e, "BOE summary body was not valid JSON");
                }
            }

            day += chrono::Duration::days(1);
        }

        tracing::info!(
            count = records.len(),
            from = %window.date_from,
            to = %window.date_to,
            "BOE crawl finished"
        );

        Ok(records)
    }
}
