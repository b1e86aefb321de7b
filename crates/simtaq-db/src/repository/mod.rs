//! Repository layer: query functions organized by table.
//!
//! Functions that may run inside a transaction take `impl PgExecutor` so callers
//! can pass either the pool or `&mut *tx`.

pub mod activity_logs;
pub mod certificates;
pub mod guru;
pub mod hafalan;
pub mod kelas;
pub mod laporan;
pub mod notifications;
pub mod orang_tua;
pub mod pengumuman;
pub mod presensi;
pub mod push_subscriptions;
pub mod rate_limits;
pub mod siswa;
pub mod stats;
pub mod tahun_ajaran;
pub mod tasmi;
pub mod users;
