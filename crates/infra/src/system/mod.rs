use chrono::Utc;

/// Clock seam for the engine. Due-ness checks, validation of future-dated
/// schedules and dispatch passes all read time through the context, so
/// tests pin the clock to a fixed instant instead of sleeping.
pub trait ISys: Send + Sync {
    /// Current instant as epoch millis
    fn get_timestamp_millis(&self) -> i64;
}

/// Wall clock, used outside of tests
pub struct RealSys {}
impl ISys for RealSys {
    fn get_timestamp_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
