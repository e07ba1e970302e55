//! Grid-engine batch script template.

use crate::error::SchedResult;
use crate::template::ScriptRenderer;

const TEMPLATE_NAME: &str = "grid_engine.sh";

const TEMPLATE: &str = r#"#!/bin/bash
#$ -l {{ resource_type_num }}
#$ -l h_rt={{ walltime }}
#$ -N {{ name_job }}
#$ -p {{ priority }}
#$ -cwd
cd {{ job.work_dir }}
LANG=C
. {{ job.job_file }}
"#;

pub(super) fn renderer() -> SchedResult<ScriptRenderer> {
    ScriptRenderer::new(TEMPLATE_NAME, TEMPLATE)
}
