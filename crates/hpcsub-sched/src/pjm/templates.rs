//! PJM batch script template.

use minijinja::{Error, ErrorKind};

use crate::error::SchedResult;
use crate::pjm::schema::resource_group;
use crate::template::ScriptRenderer;

const TEMPLATE_NAME: &str = "pjm.sh";

const TEMPLATE: &str = r##"#!/bin/bash -x
#
#PJM -L "node={{ node }}"
#PJM -L "rscgrp={{ rscgrp(node, elapse, memory_config) }}"
#PJM -L "elapse={{ elapse }}"
#PJM -g "{{ group }}"
#PJM --mpi "proc={{ mpi_procs }}"
#PJM --mpi "max-proc-per-node={{ max_mpi_procs_per_node }}"
#PJM -s

cd {{ job.work_dir }}
. {{ job.job_file }}
"##;

/// Build the renderer. `group` is exposed as a template global.
pub(super) fn renderer(group: &str) -> SchedResult<ScriptRenderer> {
    let mut renderer = ScriptRenderer::new(TEMPLATE_NAME, TEMPLATE)?.with_global("group", group);
    renderer.environment_mut().add_function(
        "rscgrp",
        |node: String, elapse: String, memory_config: String| {
            resource_group(&node, &elapse, &memory_config)
                .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
        },
    );
    Ok(renderer)
}
