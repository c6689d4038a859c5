// Drive discovery and operations
//
// Organized structure:
// - descriptor.rs: DeviceDescriptor / MediaClass
// - classifier.rs: fuses primary and secondary sources into descriptors
// - sources/: platform enumeration sources (sysfs, lsblk, CIM, Get-PhysicalDisk)
// - operations/: discard primitives used by trim jobs

pub mod classifier;
pub mod descriptor;
pub mod operations;
pub mod sources;


pub use classifier::{classify, DriveClassifier};
pub use descriptor::{DeviceDescriptor, MediaClass};
pub use sources::{PrimarySource, RawDisk, SecondaryOpinion, SecondarySource};
