//! Form schema tables
//!
//! Each (category, schema version) pair gets one immutable table: the
//! field numbers worth keeping, how they rename onto semantic columns,
//! where the invoice identifier comes from, and (conference only) which
//! fields are concatenated into account codes. Both versions feed the
//! same normalization code.

use std::collections::{BTreeSet, HashMap};

use crate::domain::columns::{
    EMAIL_API, EMPLOYEE_ID, FIRST, INVOICE_DATE, LAST, TOTAL_REIMBURSEMENT,
};
use crate::domain::{Category, SchemaVersion};

/// Where a category's invoice identifier is derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceSource {
    /// Old campaigns: one free-text field like "March 2024"
    FreeText(u32),
    /// New campaigns: a set of date fields whose span names the invoice
    DateFields(Vec<u32>),
}

impl InvoiceSource {
    pub fn field_numbers(&self) -> Vec<u32> {
        match self {
            InvoiceSource::FreeText(number) => vec![*number],
            InvoiceSource::DateFields(numbers) => numbers.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategorySchema {
    pub category: Category,
    pub version: SchemaVersion,
    pub target_fields: BTreeSet<u32>,
    /// Field number to semantic column
    pub rename: Vec<(u32, &'static str)>,
    pub invoice_source: InvoiceSource,
    /// Field groups concatenated into Account Code 1..3
    pub account_code_groups: Option<[Vec<u32>; 3]>,
}

/// All six schema tables
#[derive(Debug, Clone)]
pub struct FormSchemas {
    tables: HashMap<(Category, SchemaVersion), CategorySchema>,
}

impl FormSchemas {
    pub fn get(&self, category: Category, version: SchemaVersion) -> Option<&CategorySchema> {
        self.tables.get(&(category, version))
    }

    fn insert(&mut self, schema: CategorySchema) {
        self.tables.insert((schema.category, schema.version), schema);
    }
}

fn fields(ranges: &[std::ops::RangeInclusive<u32>]) -> Vec<u32> {
    ranges.iter().flat_map(|r| r.clone()).collect()
}

const EXPENSE_RENAME: &[(u32, &str)] = &[
    (74, INVOICE_DATE),
    (4, EMPLOYEE_ID),
    (3, FIRST),
    (2, LAST),
    (60, "Account Code 1"),
    (61, "Account Code 1 Total"),
    (62, "Account Code 2"),
    (63, "Account Code 2 Total"),
    (83, TOTAL_REIMBURSEMENT),
    (9, EMAIL_API),
];

const MILEAGE_RENAME: &[(u32, &str)] = &[
    (368, INVOICE_DATE),
    (1, EMPLOYEE_ID),
    (489, FIRST),
    (490, LAST),
    (415, "Account Code 1"),
    (144, "Account Code 1 Total"),
    (416, "Account Code 2"),
    (148, "Account Code 2 Total"),
    (699, TOTAL_REIMBURSEMENT),
];

const CONFERENCE_RENAME: &[(u32, &str)] = &[
    (118, INVOICE_DATE),
    (1, EMPLOYEE_ID),
    (2, FIRST),
    (3, LAST),
    (86, "Account Code 1 Total"),
    (97, "Account Code 2 Total"),
    (108, "Account Code 3 Total"),
    (75, TOTAL_REIMBURSEMENT),
];

impl Default for FormSchemas {
    fn default() -> Self {
        let mut schemas = FormSchemas {
            tables: HashMap::new(),
        };

        let expense_base = fields(&[74..=74, 4..=4, 2..=3, 60..=63, 83..=83, 9..=9]);
        schemas.insert(CategorySchema {
            category: Category::Expense,
            version: SchemaVersion::Old,
            target_fields: expense_base.iter().copied().chain([80]).collect(),
            rename: EXPENSE_RENAME.to_vec(),
            invoice_source: InvoiceSource::FreeText(80),
            account_code_groups: None,
        });
        schemas.insert(CategorySchema {
            category: Category::Expense,
            version: SchemaVersion::New,
            target_fields: expense_base.iter().copied().chain(84..=99).collect(),
            rename: EXPENSE_RENAME.to_vec(),
            invoice_source: InvoiceSource::DateFields(fields(&[84..=99])),
            account_code_groups: None,
        });

        let mileage_base = fields(&[
            368..=368,
            1..=1,
            489..=490,
            415..=416,
            144..=144,
            148..=148,
            699..=699,
        ]);
        let mileage_dates = fields(&[374..=374, 389..=389, 399..=411]);
        schemas.insert(CategorySchema {
            category: Category::Mileage,
            version: SchemaVersion::Old,
            target_fields: mileage_base.iter().copied().chain([488]).collect(),
            rename: MILEAGE_RENAME.to_vec(),
            invoice_source: InvoiceSource::FreeText(488),
            account_code_groups: None,
        });
        schemas.insert(CategorySchema {
            category: Category::Mileage,
            version: SchemaVersion::New,
            target_fields: mileage_base
                .iter()
                .chain(mileage_dates.iter())
                .copied()
                .collect(),
            rename: MILEAGE_RENAME.to_vec(),
            invoice_source: InvoiceSource::DateFields(mileage_dates),
            account_code_groups: None,
        });

        let conference_base = fields(&[1..=3, 118..=118, 76..=84, 86..=95, 97..=106, 108..=108, 75..=75]);
        let conference_groups = [fields(&[76..=84]), fields(&[87..=95]), fields(&[98..=106])];
        schemas.insert(CategorySchema {
            category: Category::Conference,
            version: SchemaVersion::Old,
            target_fields: conference_base.iter().copied().chain([137]).collect(),
            rename: CONFERENCE_RENAME.to_vec(),
            invoice_source: InvoiceSource::FreeText(137),
            account_code_groups: Some(conference_groups.clone()),
        });
        schemas.insert(CategorySchema {
            category: Category::Conference,
            version: SchemaVersion::New,
            target_fields: conference_base.iter().copied().chain(14..=18).collect(),
            rename: CONFERENCE_RENAME.to_vec(),
            invoice_source: InvoiceSource::DateFields(fields(&[14..=18])),
            account_code_groups: Some(conference_groups),
        });

        schemas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_pair_has_a_table() {
        let schemas = FormSchemas::default();
        for category in Category::ALL {
            for version in SchemaVersion::ALL {
                let schema = schemas.get(category, version).unwrap();
                assert_eq!(schema.category, category);
                assert_eq!(schema.version, version);
            }
        }
    }

    #[test]
    fn test_renamed_and_invoice_fields_are_targeted() {
        let schemas = FormSchemas::default();
        for category in Category::ALL {
            for version in SchemaVersion::ALL {
                let schema = schemas.get(category, version).unwrap();
                for (number, _) in &schema.rename {
                    assert!(schema.target_fields.contains(number), "{category} {number}");
                }
                for number in schema.invoice_source.field_numbers() {
                    assert!(schema.target_fields.contains(&number), "{category} {number}");
                }
            }
        }
    }

    #[test]
    fn test_known_table_shapes() {
        let schemas = FormSchemas::default();

        let expense_old = schemas.get(Category::Expense, SchemaVersion::Old).unwrap();
        assert_eq!(expense_old.target_fields.len(), 11);
        assert_eq!(expense_old.invoice_source, InvoiceSource::FreeText(80));

        let expense_new = schemas.get(Category::Expense, SchemaVersion::New).unwrap();
        assert_eq!(expense_new.target_fields.len(), 26);

        let mileage_new = schemas.get(Category::Mileage, SchemaVersion::New).unwrap();
        assert_eq!(
            mileage_new.invoice_source.field_numbers().len(),
            15,
            "374, 389 and 399..=411"
        );

        let conference_new = schemas.get(Category::Conference, SchemaVersion::New).unwrap();
        let groups = conference_new.account_code_groups.as_ref().unwrap();
        assert_eq!(groups[0].first(), Some(&76));
        assert_eq!(groups[1].len(), 9);
        assert_eq!(groups[2].last(), Some(&106));
        assert!(!conference_new.target_fields.contains(&137));
    }
}
