//! Turning a parsed plan into runnable steps.

use std::path::Path;

use crate::config::schema::{PlanConfig, StepConfig};
use crate::steps::{CommandContext, CommandStep, Step};

/// Build the command step for one plan entry.
///
/// `default_retry` from the plan settings applies when the step has no
/// retry block of its own.
pub fn build_step(plan: &PlanConfig, config: &StepConfig) -> CommandStep {
    let mut step = CommandStep::new(
        config.name.clone(),
        config.command.clone().unwrap_or_default(),
    )
    .depends_on(config.depends_on.iter().cloned());

    if let Some(retry) = plan.effective_retry(config) {
        step = step.with_retry(retry.to_policy());
    }
    if let Some(variable) = &config.capture {
        step = step.capture(variable.clone());
    }
    for (key, value) in &config.env {
        step = step.env(key.clone(), value.clone());
    }

    step
}

/// Build every step of the plan, in input order.
pub fn build_steps(plan: &PlanConfig) -> Vec<Box<dyn Step<CommandContext>>> {
    plan.steps
        .iter()
        .map(|config| Box::new(build_step(plan, config)) as Box<dyn Step<CommandContext>>)
        .collect()
}

/// Initial context for running `plan` from `project_root`.
pub fn build_context(plan: &PlanConfig, project_root: &Path) -> CommandContext {
    let working_dir = match &plan.settings.working_dir {
        Some(dir) => project_root.join(dir),
        None => project_root.to_path_buf(),
    };

    CommandContext {
        env: plan.settings.env.clone(),
        working_dir: Some(working_dir),
        shell: plan.settings.shell.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn plan(yaml: &str) -> PlanConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn builds_steps_in_order_with_dependencies() {
        let plan = plan(
            r#"
steps:
  - name: root
    command: "true"
    depends_on: [a]
  - name: a
    command: "true"
"#,
        );
        let steps = build_steps(&plan);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name(), "root");
        assert_eq!(steps[0].dependencies(), ["a"]);
    }

    #[test]
    fn default_retry_applies_to_steps_without_one() {
        let plan = plan(
            r#"
settings:
  default_retry:
    count: 2
    initial_delay: 10ms
steps:
  - name: a
    command: "true"
  - name: b
    command: "true"
    retry:
      count: 0
"#,
        );
        let steps = build_steps(&plan);
        let a = steps[0].retry_policy().unwrap();
        assert_eq!(a.retry_count, 2);
        assert_eq!(a.initial_delay, Duration::from_millis(10));
        assert_eq!(steps[1].retry_policy().unwrap().retry_count, 0);
    }

    #[test]
    fn no_retry_without_settings() {
        let plan = plan("steps:\n  - name: a\n    command: \"true\"\n");
        assert!(build_steps(&plan)[0].retry_policy().is_none());
    }

    #[test]
    fn context_seeds_env_and_working_dir() {
        let plan = plan(
            r#"
settings:
  shell: /bin/bash
  working_dir: app
  env:
    RAILS_ENV: development
"#,
        );
        let ctx = build_context(&plan, Path::new("/srv/project"));
        assert_eq!(ctx.var("RAILS_ENV"), Some("development"));
        assert_eq!(ctx.working_dir.as_deref(), Some(Path::new("/srv/project/app")));
        assert_eq!(ctx.shell.as_deref(), Some("/bin/bash"));
    }
}
