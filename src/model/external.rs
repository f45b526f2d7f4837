//! Third-party models driven through their own command line.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;

use crate::config::ExternalConfig;
use crate::error::NovoError;

/// Paths handed to the external runner.
#[derive(Debug, Clone, Default)]
pub struct RunPaths {
    pub data_path: PathBuf,
    pub model_path: Option<PathBuf>,
    pub denovo_output_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
}

pub struct ExternalModel {
    config: ExternalConfig,
}

impl ExternalModel {
    pub fn new(config: ExternalConfig) -> Self {
        ExternalModel { config }
    }

    /// Arguments with placeholders filled in. Unset paths become empty strings.
    pub fn arguments(&self, mode: &str, paths: &RunPaths) -> Vec<String> {
        let show = |p: &Option<PathBuf>| {
            p.as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        let data_path = paths.data_path.display().to_string();
        let model_path = show(&paths.model_path);
        let output_path = show(&paths.denovo_output_path);
        let config_path = show(&paths.config_path);

        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{mode}", mode)
                    .replace("{data_path}", &data_path)
                    .replace("{model_path}", &model_path)
                    .replace("{denovo_output_path}", &output_path)
                    .replace("{config_path}", &config_path)
            })
            .collect()
    }

    /// Launch the runner and wait for it.
    pub fn run(&self, mode: &str, paths: &RunPaths) -> Result<()> {
        let args = self.arguments(mode, paths);
        log::info!("Running {} {}", self.config.program, args.join(" "));

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&args).envs(&self.config.env);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        let status = cmd.status().map_err(|e| NovoError::ExternalCommand {
            program: self.config.program.clone(),
            reason: e.to_string(),
        })?;
        if !status.success() {
            return Err(NovoError::ExternalCommand {
                program: self.config.program.clone(),
                reason: format!("exited with {status}"),
            }
            .into());
        }
        if let Some(out) = &paths.denovo_output_path {
            if mode == "seq" && !Path::new(out).exists() {
                log::warn!("{} finished but wrote no {}", self.config.program, out.display());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn external(program: &str, args: &[&str]) -> ExternalModel {
        ExternalModel::new(ExternalConfig {
            program: program.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: BTreeMap::new(),
            working_dir: None,
        })
    }

    #[test]
    fn placeholders_are_substituted() {
        let model = external(
            "casanovo",
            &["--mode={mode}", "{data_path}", "--model", "{model_path}", "-o", "{denovo_output_path}", "{config_path}"],
        );
        let paths = RunPaths {
            data_path: "data/test.parquet".into(),
            model_path: Some("ckpt/casanovo.ckpt".into()),
            denovo_output_path: Some("out.csv".into()),
            config_path: None,
        };
        assert_eq!(
            model.arguments("seq", &paths),
            vec!["--mode=seq", "data/test.parquet", "--model", "ckpt/casanovo.ckpt", "-o", "out.csv", ""]
        );
    }

    #[cfg(unix)]
    #[test]
    fn runs_command_and_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("denovo.csv");
        let model = external("sh", &["-c", "echo {mode} > {denovo_output_path}"]);
        let paths = RunPaths {
            data_path: dir.path().to_path_buf(),
            denovo_output_path: Some(out.clone()),
            ..RunPaths::default()
        };
        model.run("seq", &paths).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap().trim(), "seq");

        let failing = external("sh", &["-c", "exit 3"]);
        let err = failing.run("train", &paths).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NovoError>(),
            Some(NovoError::ExternalCommand { .. })
        ));
    }

    #[test]
    fn missing_program_is_an_error() {
        let model = external("definitely-not-a-real-novo-runner", &[]);
        assert!(model.run("train", &RunPaths::default()).is_err());
    }
}
