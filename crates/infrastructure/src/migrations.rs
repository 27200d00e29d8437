use sqlx::migrate::Migrator;

/// 编译期嵌入的数据库迁移脚本（仓库根目录下的 `migrations/`）。
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");
