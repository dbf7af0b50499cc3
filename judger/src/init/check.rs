use cgroups_rs::{hierarchies, Hierarchy, Subsystem};

use super::config::{GlobalConfig, CONFIG};

/// Requirements that only depend on the config
fn check_config(config: &GlobalConfig) -> Result<(), String> {
    let runtime = &config.nsjail.runtime;
    if !runtime.is_file() {
        return Err(format!(
            "nsjail runtime {} is not a file",
            runtime.to_string_lossy()
        ));
    }
    if config.nsjail.output_limit == 0 {
        return Err("config.nsjail.output_limit should be positive".to_owned());
    }
    if config.platform.report_limit == 0 {
        log::warn!("config.platform.report_limit is 0, reports will be empty");
    }
    if config.nsjail.compiler_uid == config.nsjail.runner_uid {
        log::warn!("submissions share uid with compilers and trusted programs");
    }
    Ok(())
}

/// nsjail is told which hierarchy to use, so the host must run that one
fn check_cgroup_version(host_v2: bool, config_v2: bool) -> Result<(), String> {
    match (host_v2, config_v2) {
        (true, false) => Err(
            "host runs cgroup v2 but config.nsjail.cgroup_v2 is false".to_owned(),
        ),
        (false, true) => Err(
            "host runs cgroup v1 but config.nsjail.cgroup_v2 is true".to_owned(),
        ),
        _ => Ok(()),
    }
}

fn check_cgroup(config: &GlobalConfig) -> Result<(), String> {
    check_cgroup_version(
        hierarchies::is_cgroup2_unified_mode(),
        config.nsjail.cgroup_v2,
    )?;
    let hier = hierarchies::auto();
    let subsystems = hier.subsystems();
    if !subsystems.iter().any(|sub| matches!(sub, Subsystem::Mem(_))) {
        return Err("Subsystem Mem(Memory) is unavailable.".to_owned());
    }
    if !subsystems.iter().any(|sub| matches!(sub, Subsystem::Cpu(_))) {
        log::warn!("Subsystem Cpu(Cpu Scheduling) is unavailable.");
    }
    if !subsystems.iter().any(|sub| matches!(sub, Subsystem::Pid(_))) {
        log::warn!("Subsystem Pid(Process Number) is unavailable.");
    }
    Ok(())
}

// Check if all required systems are met
// abort if necessary
pub fn init() {
    let config = CONFIG.get().unwrap();

    if let Err(reason) = check_config(config).and_then(|_| check_cgroup(config)) {
        log::error!("{}", reason);
        std::process::exit(1);
    }

    if !rustix::process::getuid().is_root() {
        log::warn!("nsjail require root to switch uid and to mount, judging may fail");
    }
}
