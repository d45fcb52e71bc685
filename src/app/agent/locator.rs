use std::path::Path;

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|candidate| candidate.strip_suffix('"'))
    {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed
        .strip_prefix('\'')
        .and_then(|candidate| candidate.strip_suffix('\''))
    {
        return inner.trim().to_string();
    }
    trimmed.to_string()
}

/// Resolves a configured override to a runnable program name, falling back to
/// the default CLI on PATH when the override is empty.
pub fn resolve_program(config_path: &str, default_program: &str) -> String {
    let normalized = normalize_command_path(config_path);
    if normalized.is_empty() {
        default_program.to_string()
    } else {
        normalized
    }
}

pub fn validate_program(program: &str, default_program: &str) -> Result<(), String> {
    if program.trim().is_empty() {
        return Err("Command path is empty".to_string());
    }
    if program == default_program {
        return Ok(());
    }
    let path = Path::new(program);
    if path.is_dir() {
        return Err("Command path must point to an executable file".to_string());
    }
    if !path.exists() {
        return Err("Executable not found at the configured path".to_string());
    }
    Ok(())
}
