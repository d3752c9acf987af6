//! Fixed column names and column orders for every table the engine emits

pub const ORG_ID: &str = "Org Id";
pub const INVOICE_NUMBER: &str = "Invoice #";
pub const INVOICE_DATE: &str = "Invoice Date";
pub const EMPLOYEE_ID: &str = "Employee #";
pub const FIRST: &str = "First";
pub const LAST: &str = "Last";
pub const EMAIL_API: &str = "Email_API";
pub const EMAIL_ROSTER: &str = "Email_Escape";
pub const EMP_STATUS: &str = "Emp_Status";
pub const TOTAL_REIMBURSEMENT: &str = "Total Reimbursement";
pub const FORM: &str = "Form";
pub const MATCH_STATUS: &str = "Match Status";

pub const ACCOUNT_CODES: [&str; 3] = ["Account Code 1", "Account Code 2", "Account Code 3"];
pub const ACCOUNT_TOTALS: [&str; 3] = [
    "Account Code 1 Total",
    "Account Code 2 Total",
    "Account Code 3 Total",
];

/// Semantic columns shared by every category sheet
pub const COMMON_COLUMNS: [&str; 11] = [
    INVOICE_DATE,
    EMPLOYEE_ID,
    FIRST,
    LAST,
    "Account Code 1",
    "Account Code 1 Total",
    "Account Code 2",
    "Account Code 2 Total",
    "Account Code 3",
    "Account Code 3 Total",
    TOTAL_REIMBURSEMENT,
];

/// Roster header, applied positionally on load
pub const ROSTER_COLUMNS: [&str; 6] = [ORG_ID, LAST, FIRST, EMPLOYEE_ID, EMP_STATUS, EMAIL_ROSTER];

/// Order of the reconciled ("Merged") table
pub const MERGED_COLUMNS: [&str; 17] = [
    ORG_ID,
    INVOICE_NUMBER,
    INVOICE_DATE,
    EMPLOYEE_ID,
    FIRST,
    LAST,
    EMAIL_ROSTER,
    "Account Code 1",
    "Account Code 1 Total",
    "Account Code 2",
    "Account Code 2 Total",
    "Account Code 3",
    "Account Code 3 Total",
    TOTAL_REIMBURSEMENT,
    EMP_STATUS,
    FORM,
    MATCH_STATUS,
];

pub const PAYEE_NAME: &str = "Payee Name";
pub const LEDGER_ACCOUNT: &str = "Account";
pub const LEDGER_AMOUNT: &str = "Amount";
pub const LEDGER_ORG_ID: &str = "Org ID";
pub const LEDGER_BANK: &str = "Bank";
pub const LEDGER_COMMENT: &str = "Comment";
pub const LEDGER_PAYMENT_TYPE: &str = "PymtType";
pub const LEDGER_EMP_ID: &str = "EmpId";

/// Payment-upload template, in the order the payment system imports it
pub const LEDGER_COLUMNS: [&str; 23] = [
    "Transfer Date",
    "Tran Date",
    LEDGER_ORG_ID,
    LEDGER_BANK,
    "Vendor",
    INVOICE_DATE,
    LEDGER_AMOUNT,
    LEDGER_ACCOUNT,
    INVOICE_NUMBER,
    LEDGER_COMMENT,
    "Local Field",
    "City",
    "Country",
    PAYEE_NAME,
    "State",
    "Street",
    "ZIP",
    LEDGER_PAYMENT_TYPE,
    LEDGER_EMP_ID,
    "Ref#",
    "VendorAddrId",
    "FinalPymt",
    "OnHold",
];
