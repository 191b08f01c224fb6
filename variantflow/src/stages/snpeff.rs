//! SnpEff command builder.

use super::channels;
use super::gatk::path_arg;
use super::tool::{CommandBuilder, CommandRequest, Invocation};
use crate::errors::PipelineError;

/// Effect annotation of the combined variant set against the external
/// SnpEff database for the run's genome.
///
/// SnpEff writes the annotated VCF to stdout, so the invocation
/// redirects stdout into the declared output file; the version banner
/// and statistics land in the instance log via stderr.
#[derive(Debug, Clone, Copy)]
pub struct SnpEffAnnotate;

impl CommandBuilder for SnpEffAnnotate {
    fn plan(&self, req: &CommandRequest<'_>) -> Result<Vec<Invocation>, PipelineError> {
        let out = req.stage_dir.join(format!("{}_effects.vcf", req.key));

        Ok(vec![Invocation::new(vec![
            req.tools.snpeff.clone(),
            "eff".to_string(),
            "-noStats".to_string(),
            "-o".to_string(),
            "vcf".to_string(),
            req.resources.genome.clone(),
            path_arg(req.inputs.path(channels::COMBINED)?),
        ])
        .with_stdout_to(out)])
    }
}
