// src/dag/standard.rs

//! The built-in regionally-refined-mesh pipeline: scripts, prerequisites
//! and expected outputs of each step. `rrmflow.toml` can override any of it.

use std::collections::BTreeMap;

use crate::dag::DependencyGraph;
use crate::manifest::OutputSpec;
use crate::types::{Dependency, Step};

/// Everything the runner knows about one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDefinition {
    pub step: Step,
    /// Script file, relative to the script directory.
    pub script: String,
    pub after: Vec<Step>,
    pub date_var: Option<String>,
    /// output key → path template.
    pub outputs: BTreeMap<String, String>,
}

impl StepDefinition {
    pub fn dependency(&self) -> Dependency {
        Dependency::from_steps(self.after.iter().copied())
    }

    pub fn output_spec(&self) -> OutputSpec {
        OutputSpec {
            step: self.step,
            date_var: self.date_var.clone(),
            outputs: self.outputs.clone(),
        }
    }
}

/// Dependency graph of a list of definitions.
pub fn graph_of(defs: &[StepDefinition]) -> DependencyGraph {
    DependencyGraph::new(defs.iter().map(|d| (d.step, d.dependency())))
}

fn def(
    step: Step,
    script: &str,
    after: &[Step],
    date_var: Option<&str>,
    outputs: &[(&str, &str)],
) -> StepDefinition {
    StepDefinition {
        step,
        script: script.to_string(),
        after: after.to_vec(),
        date_var: date_var.map(str::to_string),
        outputs: outputs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

/// Definitions for the six standard steps, in step order.
///
/// `generate_topo.sh` and `generate_atmsrf.sh` also write auxiliary files;
/// those are part of the `topo` and `dry_dep` outputs so each script is
/// launched by exactly one step.
pub fn standard_pipeline() -> Vec<StepDefinition> {
    use Step::*;

    vec![
        def(
            Mesh,
            "generate_initial_mesh.sh",
            &[],
            None,
            &[
                ("dyn_grid", "${output_root}/${dyn_grid_name}.g"),
                ("atm_grid", "${output_root}/${atm_grid_name}.g"),
                ("atm_scrip", "${output_root}/${atm_grid_name}_scrip.nc"),
            ],
        ),
        def(
            Map,
            "generate_mapping_files.sh",
            &[Mesh],
            Some("date"),
            &[
                ("map_ocn_to_lnd_aave", "${output_root}/map_${ocn_grid_name}_to_${lnd_grid_name}_aave.{date}.nc"),
                ("map_ocn_to_atm", "${output_root}/map_${ocn_grid_name}_to_${atm_grid_name}_mono.{date}.nc"),
                ("map_atm_to_ocn", "${output_root}/map_${atm_grid_name}_to_${ocn_grid_name}_mono.{date}.nc"),
                ("map_lnd_to_atm", "${output_root}/map_${lnd_grid_name}_to_${atm_grid_name}_mono.{date}.nc"),
                ("map_atm_to_lnd", "${output_root}/map_${atm_grid_name}_to_${lnd_grid_name}_mono.{date}.nc"),
                ("map_ocn_to_lnd", "${output_root}/map_${ocn_grid_name}_to_${lnd_grid_name}_mono.{date}.nc"),
                ("map_atm_to_lnd_bilin", "${output_root}/map_${atm_grid_name}_to_${lnd_grid_name}_bilin.{date}.nc"),
                ("map_atm_to_ocn_bilin", "${output_root}/map_${atm_grid_name}_to_${ocn_grid_name}_bilin.{date}.nc"),
                ("map_ocn_to_lnd_nco", "${output_root}/map_${ocn_grid_name}_to_${lnd_grid_name}_nco.{date}.nc"),
            ],
        ),
        def(
            Domain,
            "generate_domain_files.sh",
            &[Mesh, Map],
            Some("date"),
            &[
                ("ocn_domain_atm_ocn", "${output_root}/domain.ocn.${atm_grid_name}_${ocn_grid_name}.{date}.nc"),
                ("lnd_domain_atm_ocn", "${output_root}/domain.lnd.${atm_grid_name}_${ocn_grid_name}.{date}.nc"),
                ("ocn_domain_lnd_ocn", "${output_root}/domain.ocn.${lnd_grid_name}_${ocn_grid_name}.{date}.nc"),
                ("ocn_domain", "${output_root}/domain.ocn.${ocn_grid_name}.{date}.nc"),
                ("lnd_domain_lnd_ocn", "${output_root}/domain.lnd.${lnd_grid_name}_${ocn_grid_name}.{date}.nc"),
            ],
        ),
        def(
            Topo,
            "generate_topo.sh",
            &[Mesh],
            None,
            &[
                ("topo", "${output_root}/USGS-gtopo30_${atm_grid_name}_12xdel2.nc"),
                ("namelist", "${output_root}/homme_tool_input.nl"),
                ("pg4_grid", "${output_root}/${dyn_grid_name}pg4.g"),
                ("pg4_scrip", "${output_root}/${dyn_grid_name}pg4_scrip.nc"),
                ("pg4_topo", "${output_root}/${dyn_grid_name}pg4_topo.nc"),
                ("smoothed_topo", "${output_root}/${atm_grid_name}_smoothed_phis1.nc"),
            ],
        ),
        def(
            DryDep,
            "generate_atmsrf.sh",
            &[Mesh],
            Some("date"),
            &[
                ("atmsrf", "${output_root}/atmsrf_${atm_grid_name}_{date}.nc"),
                ("atmsrf_netcdf4", "${output_root}/atmsrf_${atm_grid_name}_{date}_n4.nc"),
                ("map_1x1", "${output_root}/map_1x1_to_${atm_grid_name}_mono.nc"),
            ],
        ),
        def(
            AtmIc,
            "create_atm_initial_condition.sh",
            &[Mesh, Topo],
            Some("ic_date"),
            &[("atm_ic", "${output_root}/HICCUP.atm_era5.{date}.${atm_grid_name}.L72.nc")],
        ),
    ]
}
