//! Sends the generated payload untouched

use super::{FuzzAttempt, FuzzContext, Fuzzer};
use crate::model::{FuzzingData, ResponseCodeFamily};

#[derive(Debug, Clone, Copy, Default)]
pub struct HappyFuzzer;

impl Fuzzer for HappyFuzzer {
    fn name(&self) -> &str {
        "HappyFuzzer"
    }

    fn description(&self) -> &str {
        "send a request with all fields and headers populated"
    }

    fn fuzz(&self, data: &FuzzingData, ctx: &mut FuzzContext<'_>) {
        let attempt = FuzzAttempt::new(
            "Send a happy flow request",
            ResponseCodeFamily::TwoXX,
            data.payload.clone(),
        );
        ctx.execute(self.name(), data, attempt);
    }
}
