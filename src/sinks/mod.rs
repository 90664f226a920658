pub mod status;
pub mod subscription;
