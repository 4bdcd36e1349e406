//! Completion usage accounting.

use std::collections::HashMap;

use rusqlite::params;

use super::*;
use crate::util::now_ms;

#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageBucket {
    pub calls: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LlmUsageSummary {
    pub total_calls: i64,
    pub total_prompt_tokens: i64,
    pub total_completion_tokens: i64,
    pub today_calls: i64,
    pub today_prompt_tokens: i64,
    pub today_completion_tokens: i64,
    pub avg_duration_ms: u64,
    pub by_intent: HashMap<String, UsageBucket>,
    pub by_model: HashMap<String, UsageBucket>,
}

impl ChatDB {
    pub fn log_llm_call(
        &self,
        intent: &str,
        model: &str,
        prompt_tokens: u32,
        completion_tokens: u32,
        duration_ms: u64,
    ) -> Result<(), AlgoError> {
        let c = self.conn()?;
        c.execute(
            "INSERT INTO llm_usage (ts, intent, model, prompt_tokens, completion_tokens, duration_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![now_ms(), intent, model, prompt_tokens, completion_tokens, duration_ms as i64],
        )?;
        Ok(())
    }

    pub fn llm_usage_summary(&self) -> Result<LlmUsageSummary, AlgoError> {
        let c = self.conn()?;
        let today_start = {
            let now = now_ms();
            // Start of today in UTC
            now - (now % 86_400_000)
        };

        let (total_calls, total_prompt_tokens, total_completion_tokens, avg_duration): (i64, i64, i64, f64) =
            c.query_row(
                "SELECT COUNT(*), COALESCE(SUM(prompt_tokens),0), COALESCE(SUM(completion_tokens),0), \
                 COALESCE(AVG(duration_ms),0) FROM llm_usage",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )?;

        let (today_calls, today_prompt_tokens, today_completion_tokens): (i64, i64, i64) = c.query_row(
            "SELECT COUNT(*), COALESCE(SUM(prompt_tokens),0), COALESCE(SUM(completion_tokens),0) \
             FROM llm_usage WHERE ts >= ?1",
            [today_start],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;

        let group = |column: &str| -> Result<HashMap<String, UsageBucket>, AlgoError> {
            let mut stmt = c.prepare(&format!(
                "SELECT {column}, COUNT(*), COALESCE(SUM(prompt_tokens),0), COALESCE(SUM(completion_tokens),0) \
                 FROM llm_usage GROUP BY {column}"
            ))?;
            let rows = stmt
                .query_map([], |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        UsageBucket {
                            calls: r.get(1)?,
                            prompt_tokens: r.get(2)?,
                            completion_tokens: r.get(3)?,
                        },
                    ))
                })?
                .collect::<Result<HashMap<_, _>, _>>()?;
            Ok(rows)
        };

        Ok(LlmUsageSummary {
            total_calls,
            total_prompt_tokens,
            total_completion_tokens,
            today_calls,
            today_prompt_tokens,
            today_completion_tokens,
            avg_duration_ms: avg_duration.max(0.0) as u64,
            by_intent: group("intent")?,
            by_model: group("model")?,
        })
    }
}
