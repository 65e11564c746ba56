//! Derivative generation through the media tool.

use std::sync::Arc;
use tracing::{error, info, warn};

use super::error::{GenerationError, GenerationErrorKind};
use super::spec::{ArtifactClass, DerivativeArtifact, DerivativeSpec};
use super::work_area::WorkArea;
use crate::checksum::sha256_file;
use crate::locator::{Bundle, SourceRole};
use crate::media::{MediaTool, TranscodeJob};
use crate::metrics;

/// Produces derivative files for a bundle.
pub struct DerivativeGenerator {
    media: Arc<dyn MediaTool>,
}

impl DerivativeGenerator {
    pub fn new(media: Arc<dyn MediaTool>) -> Self {
        Self { media }
    }

    /// Produces one derivative in the work area.
    pub async fn generate(
        &self,
        bundle: &Bundle,
        spec: &DerivativeSpec,
        work_area: &WorkArea,
    ) -> Result<DerivativeArtifact, GenerationError> {
        let result = self.run(bundle, spec, work_area).await;

        let label = match &result {
            Ok(_) => "success",
            Err(e) => e.kind.as_str(),
        };
        metrics::DERIVATIVES_GENERATED
            .with_label_values(&[spec.class.as_str(), label])
            .inc();

        match &result {
            Ok(artifact) => info!(
                "Generated {} for {} ({} bytes)",
                spec.class, bundle.id, artifact.size_bytes
            ),
            Err(e) => {
                error!("Failed to generate {} for {}: {}", spec.class, bundle.id, e);
                if let Some(diagnostic) = &e.diagnostic {
                    warn!("{} diagnostic for {}:\n{}", self.media.name(), bundle.id, diagnostic);
                }
            }
        }

        result
    }

    /// Runs every spec, each independently of the others' outcome.
    pub async fn generate_all(
        &self,
        bundle: &Bundle,
        specs: &[DerivativeSpec],
        work_area: &WorkArea,
    ) -> Vec<Result<DerivativeArtifact, GenerationError>> {
        let mut results = Vec::with_capacity(specs.len());
        for spec in specs {
            results.push(self.generate(bundle, spec, work_area).await);
        }
        results
    }

    async fn run(
        &self,
        bundle: &Bundle,
        spec: &DerivativeSpec,
        work_area: &WorkArea,
    ) -> Result<DerivativeArtifact, GenerationError> {
        let class = spec.class;
        let (role, source) = spec
            .sources
            .iter()
            .find_map(|role| bundle.file(*role).map(|path| (*role, path)))
            .ok_or_else(|| {
                GenerationError::new(
                    GenerationErrorKind::UnsupportedInput,
                    class,
                    format!("bundle has none of {:?}", spec.sources),
                )
            })?;

        // Fallback sources need a probe: posters from video need the
        // duration, audio taken from a video master needs an audio track.
        let mut duration_secs = 0.0;
        if role != spec.sources[0] || (class == ArtifactClass::Poster && role == SourceRole::VideoMaster) {
            let info = self
                .media
                .probe(source)
                .await
                .map_err(|e| GenerationError::from_tool(class, &e))?;
            if class == ArtifactClass::AudioAccess && !info.has_audio() {
                return Err(GenerationError::new(
                    GenerationErrorKind::UnsupportedInput,
                    class,
                    format!("{} has no audio track", source.display()),
                ));
            }
            duration_secs = info.duration_secs;
        }

        let output_path = work_area.file(&spec.local_file_name(&bundle.id));
        let job = TranscodeJob {
            job_id: format!("{}-{}", bundle.id, class),
            input_path: source.to_path_buf(),
            output_path: output_path.clone(),
            params: spec.params_for(role, duration_secs),
        };

        self.media
            .transcode(job)
            .await
            .map_err(|e| GenerationError::from_tool(class, &e))?;

        let (sha256, size_bytes) = match tokio::fs::metadata(&output_path).await {
            Ok(meta) if meta.len() > 0 => {
                let sha256 = sha256_file(&output_path).await.map_err(|e| {
                    GenerationError::new(
                        GenerationErrorKind::ToolInvocationFailed,
                        class,
                        format!("output unreadable: {}", e),
                    )
                })?;
                (sha256, meta.len())
            }
            _ => {
                return Err(GenerationError::new(
                    GenerationErrorKind::OutputEmpty,
                    class,
                    format!("{} is missing or empty", output_path.display()),
                ))
            }
        };

        Ok(DerivativeArtifact {
            bundle_id: bundle.id.clone(),
            class,
            local_path: output_path,
            remote_key: class.remote_key(&bundle.id),
            content_type: class.content_type().to_string(),
            size_bytes,
            sha256,
        })
    }
}
