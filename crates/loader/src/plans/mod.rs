//! Load plans: the content types each feed writes and how records map onto them.

pub mod council;
pub mod course;

pub use council::{
    ContactPointPlan, CouncilDirectory, CouncilRecord, LocalAuthorityPlan, Service, ServiceRecord,
};
pub use course::{CoursePlan, CourseRecord};
