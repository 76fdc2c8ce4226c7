mod ipv4;
mod ipv6;
mod policy;
mod ranges;

pub use ipv4::{Ipv4Defragged, Ipv4Defragger, Ipv4Fragment};
pub use ipv6::{Ipv6Defragged, Ipv6Defragger, Ipv6Fragment};
pub use policy::FragmentPolicy;
pub use ranges::IntervalSet;

/// Whichever IP version's fragment was produced by the link-layer decode
/// step; routed to the matching defragger by the orchestrator.
pub enum IpFragmentKind {
    V4(Ipv4Fragment),
    V6(Ipv6Fragment),
}
