pub mod budget_item;
pub mod detail;
pub mod group;
pub mod material;
pub mod month;
pub mod reserve;
pub mod user;
pub mod work;

pub use budget_item::{BudgetItem, BudgetItemDto, Certification, CertificationPatch, WorkType};
pub use detail::{DetailInput, DetailKind, LegacyMonthlyEntry, WorkDetail};
pub use group::Group;
pub use material::Material;
pub use month::MonthlyPlan;
pub use reserve::{QuarterReserve, ReserveView};
pub use user::{CurrentUserDto, User, UserDto};
pub use work::{Feasibility, VatRate, Work, WorkDto};
