//! 参数推导 - 业务能力层
//!
//! 从已完成作业的元数据中取出粒子数，并推导分类数

use serde_json::Value as JsonValue;

use crate::error::{AppResult, JobError};
use crate::models::JobMetadata;

/// 每个类别对应的阈值份额倍数
const CLASSES_PER_THRESHOLD: u128 = 4;

/// 读取粒子数：`output_results[0].num_items[0]`
///
/// 字段缺失或无法解析时返回 0，从不报错
pub fn particle_count(metadata: &JobMetadata) -> u64 {
    metadata
        .output_results
        .first()
        .and_then(|result| result.num_items.first())
        .and_then(count_from_value)
        .unwrap_or(0)
}

fn count_from_value(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.trunc() as u64)
        }),
        JsonValue::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// 推导分类数
///
/// - `particle_count <= threshold`：粒子数不足
/// - 否则返回 `floor(particle_count * 4 / threshold)`，至少为 1
pub fn class_count(particle_count: u64, threshold: u64) -> AppResult<u32> {
    if threshold == 0 || particle_count <= threshold {
        return Err(JobError::InsufficientParticles {
            particles: particle_count,
            threshold,
        }
        .into());
    }

    let count = (particle_count as u128 * CLASSES_PER_THRESHOLD) / threshold as u128;
    Ok(u32::try_from(count).unwrap_or(u32::MAX).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::OutputResult;
    use serde_json::json;

    fn metadata_with(num_items: Vec<JsonValue>) -> JobMetadata {
        JobMetadata {
            output_results: vec![OutputResult {
                name: Some("particles_selected".to_string()),
                num_items,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_particle_count_number() {
        assert_eq!(particle_count(&metadata_with(vec![json!(5000)])), 5000);
    }

    #[test]
    fn test_particle_count_string_and_float() {
        assert_eq!(particle_count(&metadata_with(vec![json!("1234")])), 1234);
        assert_eq!(particle_count(&metadata_with(vec![json!(99.9)])), 99);
    }

    #[test]
    fn test_particle_count_missing_or_bad() {
        assert_eq!(particle_count(&JobMetadata::default()), 0);
        assert_eq!(particle_count(&metadata_with(vec![])), 0);
        assert_eq!(particle_count(&metadata_with(vec![json!("many")])), 0);
        assert_eq!(particle_count(&metadata_with(vec![json!(-5)])), 0);
        assert_eq!(particle_count(&metadata_with(vec![json!(null)])), 0);
    }

    #[test]
    fn test_class_count_formula() {
        assert_eq!(class_count(5000, 1000).unwrap(), 20);
        assert_eq!(class_count(1001, 1000).unwrap(), 4);
        assert_eq!(class_count(250_000, 100_000).unwrap(), 10);
        assert_eq!(class_count(100_001, 100_000).unwrap(), 4);
    }

    #[test]
    fn test_class_count_always_at_least_one() {
        for threshold in [1u64, 3, 7, 1000, 99_999] {
            for extra in [1u64, 2, 5, 17, 1000] {
                let particles = threshold + extra;
                let count = class_count(particles, threshold).unwrap();
                assert!(count >= 1);
                assert_eq!(count as u128, particles as u128 * 4 / threshold as u128);
            }
        }
    }

    #[test]
    fn test_class_count_insufficient() {
        let err = class_count(1000, 1000).unwrap_err();
        assert!(matches!(
            err,
            AppError::Job(JobError::InsufficientParticles {
                particles: 1000,
                threshold: 1000
            })
        ));
        assert!(class_count(0, 1000).is_err());
    }

    #[test]
    fn test_class_count_saturates() {
        assert_eq!(class_count(u64::MAX, 1).unwrap(), u32::MAX);
    }
}
