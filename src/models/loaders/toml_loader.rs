use crate::models::blueprint::TestBlueprint;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载组卷蓝图
pub async fn load_blueprint(toml_file_path: &Path) -> Result<TestBlueprint> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let blueprint = parse_blueprint(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    Ok(blueprint.with_file_path(toml_file_path.to_string_lossy().to_string()))
}

/// 解析蓝图文本
pub fn parse_blueprint(content: &str) -> Result<TestBlueprint> {
    let blueprint: TestBlueprint = toml::from_str(content)?;
    Ok(blueprint)
}

/// 从文件夹中加载所有蓝图，按文件名排序；单个文件失败只记录警告
pub async fn load_all_blueprints(folder_path: &str) -> Result<Vec<TestBlueprint>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut toml_files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(path);
        }
    }
    toml_files.sort();

    let mut blueprints = Vec::new();
    for path in toml_files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_blueprint(&path).await {
            Ok(blueprint) => {
                tracing::info!("成功加载蓝图 {}，共 {} 个分区", blueprint.code, blueprint.sections.len());
                blueprints.push(blueprint);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(blueprints)
}
