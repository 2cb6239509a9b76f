//! Credit-union sample data the mock link starts with.
//!
//! Timestamps are rendered relative to startup in the store format so that
//! ordering and expiry behave like they would against a real database.

use super::{ColumnDefault, MockTable};
use crate::models::{Row, STORE_TIMESTAMP_FORMAT};
use chrono::{Duration, Local};
use serde_json::{Value as JsonValue, json};

fn ago(delta: Duration) -> JsonValue {
    JsonValue::String((Local::now().naive_local() - delta).format(STORE_TIMESTAMP_FORMAT).to_string())
}

fn rows(values: Vec<JsonValue>) -> Vec<Row> {
    values
        .into_iter()
        .filter_map(|v| match v {
            JsonValue::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

/// Seed tables in dispatch order.
pub(super) fn tables() -> Vec<MockTable> {
    vec![
        agents(),
        messages(),
        memories(),
        query_history(),
        members(),
        accounts(),
        loans(),
        transactions(),
        branches(),
    ]
}

fn agents() -> MockTable {
    MockTable::new("AI_Agents").keyed("Agent").with_rows(rows(vec![
        json!({
            "Agent": "LoanAnalyst",
            "Description": "Analyzes loan portfolios, risk assessment, and member lending patterns",
            "Role": "Loan portfolio analyst",
            "Model_API": "ollama",
            "Model": "qwen2.5-coder",
            "Polling_Interval": 5,
            "Model_API_KEY": null
        }),
        json!({
            "Agent": "MemberServices",
            "Description": "Provides insights on member accounts, transactions, and service usage",
            "Role": "Member services assistant",
            "Model_API": "ollama",
            "Model": "qwen2.5-coder",
            "Polling_Interval": 5,
            "Model_API_KEY": null
        }),
        json!({
            "Agent": "ComplianceBot",
            "Description": "Monitors regulatory compliance, audit trails, and risk management",
            "Role": "Compliance monitor",
            "Model_API": "anthropic",
            "Model": "claude-3-sonnet",
            "Polling_Interval": 10,
            "Model_API_KEY": "sk-ant-mock-key-456"
        }),
        json!({
            "Agent": "FinancialReporter",
            "Description": "Generates financial reports, dashboards, and member analytics",
            "Role": "Financial reporting",
            "Model_API": "openai",
            "Model": "gpt-4",
            "Polling_Interval": 10,
            "Model_API_KEY": "sk-mock-key-123"
        }),
    ]))
}

fn messages() -> MockTable {
    MockTable::new("AI_Messages")
        .identity("Message_ID")
        .default_value("Posted", ColumnDefault::Now)
        .default_value("User_Read", ColumnDefault::Value(JsonValue::Null))
        .with_rows(rows(vec![
            json!({
                "Message_ID": 1,
                "Posted": ago(Duration::hours(3)),
                "User_From": "creditmanager",
                "User_To": "LoanAnalyst",
                "Message": "Can you analyze our auto loan portfolio performance for Q4?",
                "User_Read": ago(Duration::minutes(165))
            }),
            json!({
                "Message_ID": 2,
                "Posted": ago(Duration::minutes(165)),
                "User_From": "LoanAnalyst",
                "User_To": "creditmanager",
                "Message": "Analyzing Q4 auto loans... Portfolio shows 2.1% delinquency rate, avg loan $28,500, 4.2% APR average.",
                "User_Read": ago(Duration::minutes(150))
            }),
            json!({
                "Message_ID": 3,
                "Posted": ago(Duration::minutes(90)),
                "User_From": "branchmanager",
                "User_To": "MemberServices",
                "Message": "Show me member account growth trends for our three branches",
                "User_Read": null
            }),
            json!({
                "Message_ID": 4,
                "Posted": ago(Duration::minutes(75)),
                "User_From": "MemberServices",
                "User_To": "branchmanager",
                "Message": "Branch A: +127 members, Branch B: +89 members, Branch C: +156 members. Total assets grew 8.3%.",
                "User_Read": null
            }),
            json!({
                "Message_ID": 5,
                "Posted": ago(Duration::minutes(45)),
                "User_From": "auditteam",
                "User_To": "ComplianceBot",
                "Message": "Check BSA compliance for large cash transactions this month",
                "User_Read": null
            }),
            json!({
                "Message_ID": 6,
                "Posted": ago(Duration::minutes(20)),
                "User_From": "president",
                "User_To": "FinancialReporter",
                "Message": "Generate the monthly board report with key metrics and trends",
                "User_Read": null
            }),
        ]))
}

fn memories() -> MockTable {
    MockTable::new("AI_Memories")
        .identity("Memory_ID")
        .default_value("First_Posted", ColumnDefault::Now)
        .default_value("Times_Recalled", ColumnDefault::Value(json!(0)))
        .default_value("Last_Recalled", ColumnDefault::Value(JsonValue::Null))
        .default_value("Purge_After", ColumnDefault::Value(JsonValue::Null))
        .with_rows(rows(vec![
            json!({
                "Memory_ID": 1,
                "Agent": "LoanAnalyst",
                "First_Posted": ago(Duration::days(7)),
                "Times_Recalled": 5,
                "Last_Recalled": ago(Duration::hours(2)),
                "Memory_Label": "Auto Loan Risk Preferences",
                "Memory": "Credit manager prefers auto loan analysis with delinquency rates, average loan amounts, and APR trends by month.",
                "Related_To": "auto loans risk delinquency apr analysis",
                "Purge_After": null
            }),
            json!({
                "Memory_ID": 2,
                "Agent": "MemberServices",
                "First_Posted": ago(Duration::days(4)),
                "Times_Recalled": 3,
                "Last_Recalled": ago(Duration::minutes(90)),
                "Memory_Label": "Branch Performance Metrics",
                "Memory": "Branch managers frequently request member growth, asset growth, and new account metrics by branch location.",
                "Related_To": "branches members growth assets accounts",
                "Purge_After": null
            }),
            json!({
                "Memory_ID": 3,
                "Agent": "ComplianceBot",
                "First_Posted": ago(Duration::days(10)),
                "Times_Recalled": 8,
                "Last_Recalled": ago(Duration::days(1)),
                "Memory_Label": "BSA Monitoring Patterns",
                "Memory": "Audit team regularly monitors large cash transactions above $10K for BSA compliance and suspicious activity.",
                "Related_To": "bsa compliance cash transactions suspicious activity",
                "Purge_After": null
            }),
            json!({
                "Memory_ID": 4,
                "Agent": "FinancialReporter",
                "First_Posted": ago(Duration::days(15)),
                "Times_Recalled": 12,
                "Last_Recalled": ago(Duration::days(2)),
                "Memory_Label": "Board Report Requirements",
                "Memory": "Monthly board reports require: asset growth, member growth, loan portfolio health, profitability metrics, and regulatory compliance status.",
                "Related_To": "board reports monthly assets members loans profitability compliance",
                "Purge_After": null
            }),
            json!({
                "Memory_ID": 5,
                "Agent": "LoanAnalyst",
                "First_Posted": ago(Duration::days(3)),
                "Times_Recalled": 2,
                "Last_Recalled": ago(Duration::hours(8)),
                "Memory_Label": "Mortgage Underwriting Criteria",
                "Memory": "Current mortgage underwriting focuses on debt-to-income ratios below 43%, credit scores above 620, and loan-to-value under 95%.",
                "Related_To": "mortgage underwriting dti credit score ltv",
                "Purge_After": null
            }),
        ]))
}

fn query_history() -> MockTable {
    MockTable::new("AI_Query_History")
        .identity("Query_ID")
        .default_value("Executed_Time", ColumnDefault::Now)
        .with_rows(rows(vec![
            json!({
                "Query_ID": 1,
                "Agent": "LoanAnalyst",
                "Database_Name": "LoanDB",
                "SQL_Query": "SELECT COUNT(*) as Total_Loans, AVG(Loan_Amount) as Avg_Amount, AVG(Interest_Rate) as Avg_Rate FROM Auto_Loans WHERE YEAR(Origination_Date) = 2024",
                "Executed_Time": ago(Duration::minutes(165)),
                "Row_Count": 1,
                "Execution_Time_MS": 156
            }),
            json!({
                "Query_ID": 2,
                "Agent": "MemberServices",
                "Database_Name": "MemberDB",
                "SQL_Query": "SELECT Branch_ID, COUNT(*) as New_Members FROM Members WHERE Join_Date >= DATEADD(month, -1, GETDATE()) GROUP BY Branch_ID",
                "Executed_Time": ago(Duration::minutes(75)),
                "Row_Count": 3,
                "Execution_Time_MS": 234
            }),
            json!({
                "Query_ID": 3,
                "Agent": "ComplianceBot",
                "Database_Name": "TransactionDB",
                "SQL_Query": "SELECT COUNT(*) as Large_Cash_Transactions FROM Transactions WHERE Transaction_Type = 'CASH' AND Amount > 10000 AND Transaction_Date >= DATEADD(month, -1, GETDATE())",
                "Executed_Time": ago(Duration::minutes(45)),
                "Row_Count": 1,
                "Execution_Time_MS": 298
            }),
            json!({
                "Query_ID": 4,
                "Agent": "FinancialReporter",
                "Database_Name": "FinancialDB",
                "SQL_Query": "SELECT SUM(Assets) as Total_Assets, SUM(Loans_Outstanding) as Total_Loans, COUNT(DISTINCT Member_ID) as Total_Members FROM Monthly_Financials WHERE Report_Month = DATEADD(month, -1, GETDATE())",
                "Executed_Time": ago(Duration::minutes(20)),
                "Row_Count": 1,
                "Execution_Time_MS": 445
            }),
            json!({
                "Query_ID": 5,
                "Agent": "LoanAnalyst",
                "Database_Name": "LoanDB",
                "SQL_Query": "SELECT Loan_Type, COUNT(*) as Count, AVG(Credit_Score) as Avg_Credit_Score FROM Loans WHERE Status = 'DELINQUENT' GROUP BY Loan_Type",
                "Executed_Time": ago(Duration::hours(27)),
                "Row_Count": 4,
                "Execution_Time_MS": 678
            }),
            json!({
                "Query_ID": 6,
                "Agent": "MemberServices",
                "Database_Name": "AccountDB",
                "SQL_Query": "SELECT Account_Type, AVG(Balance) as Avg_Balance, COUNT(*) as Account_Count FROM Accounts WHERE Status = 'ACTIVE' GROUP BY Account_Type",
                "Executed_Time": ago(Duration::days(2)),
                "Row_Count": 5,
                "Execution_Time_MS": 123
            }),
        ]))
}

fn members() -> MockTable {
    let data = [
        (100001, "Sarah", "Johnson", "sarah.j@email.com", "555-0101", "123 Oak St", "Portland", "97201", "2020-03-15", 1, 745),
        (100002, "Michael", "Chen", "m.chen@email.com", "555-0102", "456 Pine Ave", "Portland", "97202", "2019-07-22", 1, 689),
        (100003, "Emily", "Davis", "emily.davis@email.com", "555-0103", "789 Elm Dr", "Beaverton", "97005", "2021-01-08", 2, 712),
        (100004, "Robert", "Wilson", "r.wilson@email.com", "555-0104", "321 Maple Ln", "Tigard", "97223", "2018-11-30", 2, 658),
        (100005, "Jessica", "Martinez", "j.martinez@email.com", "555-0105", "654 Cedar Ct", "Gresham", "97030", "2022-05-14", 3, 723),
        (100006, "David", "Anderson", "d.anderson@email.com", "555-0106", "987 Birch Way", "Lake Oswego", "97034", "2017-09-03", 1, 798),
        (100007, "Lisa", "Thompson", "lisa.t@email.com", "555-0107", "147 Spruce St", "Milwaukie", "97222", "2023-02-17", 3, 701),
        (100008, "James", "Brown", "j.brown@email.com", "555-0108", "258 Willow Ave", "Oregon City", "97045", "2021-08-25", 2, 675),
        (100009, "Amanda", "Garcia", "a.garcia@email.com", "555-0109", "369 Ash Blvd", "Hillsboro", "97124", "2020-12-11", 1, 734),
    ];
    MockTable::new("Members").keyed("Member_ID").with_rows(rows(
        data.iter()
            .map(|(id, first, last, email, phone, address, city, zip, joined, branch, score)| {
                json!({
                    "Member_ID": id,
                    "First_Name": first,
                    "Last_Name": last,
                    "Email": email,
                    "Phone": phone,
                    "Address": address,
                    "City": city,
                    "State": "OR",
                    "ZIP": zip,
                    "Join_Date": joined,
                    "Status": "ACTIVE",
                    "Branch_ID": branch,
                    "Credit_Score": score
                })
            })
            .collect(),
    ))
}

fn accounts() -> MockTable {
    let data = [
        (20001, 100001, "CHECKING", 3245.67, 0.05, "2020-03-16"),
        (20002, 100001, "SAVINGS", 15780.23, 2.15, "2020-03-16"),
        (20003, 100002, "CHECKING", 1892.45, 0.05, "2019-07-23"),
        (20004, 100002, "MONEY_MARKET", 25000.00, 3.25, "2021-04-10"),
        (20005, 100003, "CHECKING", 2156.78, 0.05, "2021-01-09"),
        (20006, 100003, "SAVINGS", 8934.56, 2.15, "2021-01-09"),
        (20007, 100004, "CHECKING", 567.23, 0.05, "2018-12-01"),
        (20008, 100005, "CHECKING", 4123.89, 0.05, "2022-05-15"),
        (20009, 100005, "CD", 50000.00, 4.75, "2023-01-01"),
    ];
    MockTable::new("Accounts").keyed("Account_ID").with_rows(rows(
        data.iter()
            .map(|(id, member, kind, balance, rate, opened)| {
                json!({
                    "Account_ID": id,
                    "Member_ID": member,
                    "Account_Type": kind,
                    "Balance": balance,
                    "Interest_Rate": rate,
                    "Open_Date": opened,
                    "Status": "ACTIVE"
                })
            })
            .collect(),
    ))
}

fn loans() -> MockTable {
    let data = [
        (30001, 100001, "AUTO", 28500.00, 4.25, 60, 532.45, 15230.67, "2022-06-15", "CURRENT", 745),
        (30002, 100002, "PERSONAL", 15000.00, 8.75, 48, 367.89, 8456.23, "2023-02-10", "CURRENT", 689),
        (30003, 100003, "MORTGAGE", 325000.00, 6.875, 360, 2140.67, 318500.45, "2023-08-01", "CURRENT", 712),
        (30004, 100004, "AUTO", 22000.00, 5.50, 72, 348.90, 19876.34, "2023-10-20", "DELINQUENT", 658),
        (30005, 100006, "HOME_EQUITY", 75000.00, 7.25, 120, 890.23, 67234.78, "2022-03-12", "CURRENT", 798),
        (30006, 100007, "PERSONAL", 8500.00, 9.25, 36, 271.45, 6789.12, "2023-06-05", "CURRENT", 701),
        (30007, 100008, "AUTO", 31500.00, 4.75, 60, 590.34, 12450.89, "2022-01-18", "CURRENT", 675),
    ];
    MockTable::new("Loans").keyed("Loan_ID").with_rows(rows(
        data.iter()
            .map(|(id, member, kind, amount, rate, term, payment, remaining, originated, status, score)| {
                json!({
                    "Loan_ID": id,
                    "Member_ID": member,
                    "Loan_Type": kind,
                    "Loan_Amount": amount,
                    "Interest_Rate": rate,
                    "Term_Months": term,
                    "Monthly_Payment": payment,
                    "Balance_Remaining": remaining,
                    "Origination_Date": originated,
                    "Status": status,
                    "Credit_Score": score
                })
            })
            .collect(),
    ))
}

fn transactions() -> MockTable {
    let data = [
        (40001, 20001, 100001, "DEBIT", -45.67, "GROCERY STORE", Duration::days(1), 3245.67),
        (40002, 20002, 100001, "DEPOSIT", 2500.00, "PAYROLL DEPOSIT", Duration::days(2), 15780.23),
        (40003, 20003, 100002, "ATM_WITHDRAWAL", -100.00, "ATM WITHDRAWAL", Duration::days(1), 1892.45),
        (40004, 20005, 100003, "CHECK", -1250.00, "RENT PAYMENT", Duration::days(3), 2156.78),
        (40005, 20007, 100004, "CASH", 12500.00, "LARGE CASH DEPOSIT", Duration::days(5), 567.23),
        (40006, 20008, 100005, "TRANSFER", 500.00, "TRANSFER FROM SAVINGS", Duration::hours(12), 4123.89),
    ];
    MockTable::new("Transactions").keyed("Transaction_ID").with_rows(rows(
        data.iter()
            .map(|(id, account, member, kind, amount, description, age, balance)| {
                json!({
                    "Transaction_ID": id,
                    "Account_ID": account,
                    "Member_ID": member,
                    "Transaction_Type": kind,
                    "Amount": amount,
                    "Description": description,
                    "Transaction_Date": ago(*age),
                    "Balance_After": balance
                })
            })
            .collect(),
    ))
}

fn branches() -> MockTable {
    MockTable::new("Branches").keyed("Branch_ID").with_rows(rows(vec![
        json!({
            "Branch_ID": 1,
            "Branch_Name": "Downtown Portland",
            "Address": "100 SW Main St",
            "City": "Portland",
            "State": "OR",
            "ZIP": "97204",
            "Phone": "503-555-0100",
            "Manager": "Janet Smith"
        }),
        json!({
            "Branch_ID": 2,
            "Branch_Name": "Beaverton Branch",
            "Address": "5555 SW Hall Blvd",
            "City": "Beaverton",
            "State": "OR",
            "ZIP": "97005",
            "Phone": "503-555-0200",
            "Manager": "Mark Johnson"
        }),
        json!({
            "Branch_ID": 3,
            "Branch_Name": "Gresham Branch",
            "Address": "1234 NE Burnside Rd",
            "City": "Gresham",
            "State": "OR",
            "ZIP": "97030",
            "Phone": "503-555-0300",
            "Manager": "Lisa Rodriguez"
        }),
    ]))
}
