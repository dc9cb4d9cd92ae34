/// Classification used by the waterfall to decide what an error means for the
/// current provider tier.
///
/// # Behavior Summary
///
/// | Class | Network call made? | Waterfall continues? |
/// |-------|--------------------|----------------------|
/// | `SkipProvider` | No | Yes |
/// | `NextProvider` | Yes | Yes |
/// | `Terminal` | n/a | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// The provider refused the request locally (cooldown, full window, or
    /// failed authentication). Nothing went over the wire for the payload.
    SkipProvider,

    /// The provider was attempted and failed (non-2xx, malformed payload,
    /// transport error, timeout, or unsupported operation).
    /// The next provider in the chain should be tried.
    NextProvider,

    /// Not a provider-level failure. Retrying another provider won't help.
    Terminal,
}
