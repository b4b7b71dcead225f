use super::engine::score;
use super::Prediction;
use crate::config::DetectorConfig;
use crate::error::DetectorError;
use crate::explain::Explainer;
use crate::features::{extract, hostname, BrandChecker, FeatureVector};
use crate::model::{load_with_fallback, Ensemble};
use crate::risk::RiskEngine;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// URL-level scorer: extraction, traversal, explanation, risk banding.
///
/// The ensemble is shared read-only, so one detector serves any number of
/// threads.
pub struct Detector {
    ensemble: Arc<Ensemble>,
    explainer: Explainer,
    risk: RiskEngine,
    trusted_domains: Vec<String>,
    brands: BrandChecker,
    pool: Option<rayon::ThreadPool>,
}

impl Detector {
    /// Default configuration on the global rayon pool.
    pub fn new(ensemble: Arc<Ensemble>) -> Self {
        Self::from_parts(ensemble, &DetectorConfig::default(), None)
    }

    pub fn with_config(ensemble: Arc<Ensemble>, config: &DetectorConfig) -> Result<Self, DetectorError> {
        let pool = match config.batch.workers {
            0 => None,
            n => Some(rayon::ThreadPoolBuilder::new().num_threads(n).build()?),
        };
        Ok(Self::from_parts(ensemble, config, pool))
    }

    /// Load the configured artifact (or its fallback) and build a detector.
    pub fn from_config(config: &DetectorConfig) -> Result<Self, DetectorError> {
        let ensemble = load_with_fallback(
            &config.artifact_path,
            config.fallback_artifact_path.as_deref(),
            &config.load_options(),
        )?;
        Self::with_config(Arc::new(ensemble), config)
    }

    fn from_parts(ensemble: Arc<Ensemble>, config: &DetectorConfig, pool: Option<rayon::ThreadPool>) -> Self {
        Self {
            ensemble,
            explainer: Explainer::new(config.explain.clone()),
            risk: RiskEngine::new(config.risk.clone()),
            trusted_domains: config
                .trusted_domains
                .iter()
                .map(|d| d.trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
            brands: BrandChecker::new(&config.brands),
            pool,
        }
    }

    pub fn ensemble(&self) -> &Arc<Ensemble> {
        &self.ensemble
    }

    fn is_trusted(&self, host: &str) -> bool {
        self.trusted_domains.iter().any(|d| {
            host == d
                || host
                    .strip_suffix(d.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    pub fn predict(&self, url: &str) -> Result<Prediction, DetectorError> {
        let vector = extract(url)?;
        let host = hostname(url).unwrap_or_default();
        if self.is_trusted(&host) {
            debug!(url, "trusted domain");
            return Ok(Prediction::trusted());
        }
        let prediction = self.predict_vector(&vector);
        match self.brands.check(&host) {
            Some(imitation) => {
                info!(url, brand = %imitation.brand, "brand imitation");
                Ok(prediction.imitating(&imitation))
            }
            None => Ok(prediction),
        }
    }

    /// Score an already extracted vector.
    pub fn predict_vector(&self, vector: &FeatureVector) -> Prediction {
        let s = score(&self.ensemble, vector);
        Prediction::new(s, self.explainer.explain(vector), self.risk.assess(s.probability))
    }

    /// Score in parallel. Output order matches input order; a failing URL
    /// only fails its own slot.
    pub fn predict_many<S>(&self, urls: &[S]) -> Vec<Result<Prediction, DetectorError>>
    where
        S: AsRef<str> + Sync,
    {
        let never = AtomicBool::new(false);
        self.predict_many_cancellable(urls, &never)
    }

    /// Like [`Detector::predict_many`], checking `cancel` before each URL.
    /// URLs not started when it is set come back as `Cancelled`.
    pub fn predict_many_cancellable<S>(
        &self,
        urls: &[S],
        cancel: &AtomicBool,
    ) -> Vec<Result<Prediction, DetectorError>>
    where
        S: AsRef<str> + Sync,
    {
        let run = || {
            urls.par_iter()
                .map(|url| {
                    if cancel.load(Ordering::Relaxed) {
                        return Err(DetectorError::Cancelled);
                    }
                    self.predict(url.as_ref())
                })
                .collect::<Vec<_>>()
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}
