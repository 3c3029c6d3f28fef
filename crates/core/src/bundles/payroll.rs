use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::bundles::{exceeds_input_range, BundleError, MAX_INPUT_AMOUNT};
use crate::money::round_currency;

pub const MAX_EMPLOYEES_PER_RUN: usize = 1_000;

const STANDARD_MONTHLY_HOURS: i64 = 160;
const US_SOCIAL_SECURITY_WAGE_BASE: i64 = 160_200;
const IN_PF_CAP: i64 = 1_800;
const IN_ESI_ANNUAL_LIMIT: i64 = 250_000;
const UK_PENSION_THRESHOLD: i64 = 10_000;
const UK_LEVY_ANNUAL_PAYROLL: i64 = 3_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayrollRegion {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "UK")]
    Uk,
}

impl PayrollRegion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Us => "US",
            Self::In => "IN",
            Self::Uk => "UK",
        }
    }

    /// Annual progressive brackets as (lower threshold, marginal rate).
    pub fn income_tax_brackets(&self) -> Vec<(Decimal, Decimal)> {
        let brackets: &[(i64, i64)] = match self {
            Self::Us => &[(0, 10), (9_950, 12), (40_525, 22), (86_375, 24)],
            Self::In => &[(0, 0), (250_000, 5), (500_000, 20), (1_000_000, 30)],
            Self::Uk => &[(0, 0), (12_570, 20), (50_270, 40), (150_000, 45)],
        };
        brackets
            .iter()
            .map(|(threshold, rate)| (Decimal::from(*threshold), pct(*rate, 0)))
            .collect()
    }

    pub fn filing_forms(&self) -> &'static [&'static str] {
        match self {
            Self::Us => &["941", "W-2"],
            Self::In => &["24Q"],
            Self::Uk => &["FPS"],
        }
    }
}

impl std::str::FromStr for PayrollRegion {
    type Err = BundleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "US" => Ok(Self::Us),
            "IN" => Ok(Self::In),
            "UK" | "GB" => Ok(Self::Uk),
            other => Err(BundleError::InvalidInput(format!("Unsupported payroll region `{other}`"))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeInput {
    #[serde(default)]
    pub employee_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub base_salary: Decimal,
    #[serde(default)]
    pub overtime_hours: Decimal,
    #[serde(default)]
    pub commission: Decimal,
    #[serde(default)]
    pub bonus: Decimal,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub has_transport_allowance: bool,
    #[serde(default)]
    pub has_meal_allowance: bool,
    #[serde(default)]
    pub health_insurance_deduction: Option<Decimal>,
    #[serde(default)]
    pub loan_emi: Option<Decimal>,
    #[serde(default)]
    pub voluntary_deductions: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub health_insurance_plan: Option<String>,
    #[serde(default)]
    pub retirement_contribution: Option<Decimal>,
    #[serde(default)]
    pub retirement_match_rate: Option<Decimal>,
    #[serde(default)]
    pub life_insurance_coverage: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRequest {
    #[serde(default)]
    pub employees: Vec<EmployeeInput>,
    #[serde(default)]
    pub period_start: Option<NaiveDate>,
    #[serde(default)]
    pub period_end: Option<NaiveDate>,
    #[serde(default)]
    pub pay_date: Option<NaiveDate>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub processed_by: Option<String>,
    #[serde(default)]
    pub approved_by: Option<String>,
}

fn default_region() -> String {
    "US".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeePayroll {
    pub employee_id: String,
    pub employee_name: String,
    pub earnings: BTreeMap<String, Decimal>,
    pub deductions: BTreeMap<String, Decimal>,
    pub benefits: BTreeMap<String, Decimal>,
    pub gross_pay: Decimal,
    pub total_deductions: Decimal,
    pub net_pay: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollTotals {
    pub total_employees: usize,
    pub total_gross_pay: Decimal,
    pub total_deductions: Decimal,
    pub total_net_pay: Decimal,
    pub currency: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployerLiabilities {
    pub total_gross_payroll: Decimal,
    pub employer_taxes: Decimal,
    pub benefits_cost: Decimal,
    pub total_employer_cost: Decimal,
    pub region: PayrollRegion,
    pub currency: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegulatoryFiling {
    pub form: String,
    pub due_date: NaiveDate,
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollCompliance {
    pub total_income_tax_withheld: Decimal,
    pub total_social_security: Decimal,
    pub compliance_status: String,
    pub regulatory_filings: Vec<RegulatoryFiling>,
    pub processed_by: String,
    pub approved_by: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollSummary {
    pub payroll_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub pay_date: Option<NaiveDate>,
    pub region: PayrollRegion,
    pub summary: PayrollTotals,
    pub employee_results: Vec<EmployeePayroll>,
    pub compliance: PayrollCompliance,
    pub employer_liabilities: EmployerLiabilities,
}

/// Multi-region payroll: earnings, statutory deductions, benefits and the
/// employer's side of the bill.
#[derive(Clone, Debug, Default)]
pub struct PayrollEngine;

impl PayrollEngine {
    pub fn process_payroll(&self, request: &PayrollRequest) -> Result<PayrollSummary, BundleError> {
        let (region, period_start, period_end) = validate(request)?;

        let employee_results: Vec<EmployeePayroll> =
            request.employees.iter().map(|employee| process_employee(employee, region)).collect();

        let total_gross_pay: Decimal = employee_results.iter().map(|result| result.gross_pay).sum();
        let total_deductions: Decimal =
            employee_results.iter().map(|result| result.total_deductions).sum();
        let total_net_pay: Decimal = employee_results.iter().map(|result| result.net_pay).sum();

        let compliance = compliance(&employee_results, region, period_end, request);
        let employer_liabilities =
            employer_liabilities(&employee_results, region, &request.currency);

        tracing::info!(
            event_name = "bundle.erpnext.payroll_processed",
            region = region.as_str(),
            employees = employee_results.len(),
            "payroll processed"
        );

        Ok(PayrollSummary {
            payroll_id: format!("PR-{}", Utc::now().format("%Y%m%d%H%M%S")),
            period_start,
            period_end,
            pay_date: request.pay_date,
            region,
            summary: PayrollTotals {
                total_employees: employee_results.len(),
                total_gross_pay,
                total_deductions,
                total_net_pay,
                currency: request.currency.clone(),
            },
            employee_results,
            compliance,
            employer_liabilities,
        })
    }

    pub fn capabilities(&self) -> Value {
        json!({
            "service": "erpnext",
            "capabilities": [
                "multi_region_payroll",
                "automated_tax_calculation",
                "hr_management",
                "compliance_reporting"
            ],
            "payroll_regions": ["US", "IN", "UK"],
            "max_employees_per_batch": MAX_EMPLOYEES_PER_RUN,
        })
    }
}

fn validate(
    request: &PayrollRequest,
) -> Result<(PayrollRegion, NaiveDate, NaiveDate), BundleError> {
    let mut errors = Vec::new();

    if request.employees.is_empty() {
        errors.push("No employees provided for payroll processing".to_string());
    }
    if request.employees.len() > MAX_EMPLOYEES_PER_RUN {
        errors.push(format!("Payroll run exceeds {MAX_EMPLOYEES_PER_RUN} employees"));
    }
    match (request.period_start, request.period_end) {
        (Some(start), Some(end)) if end < start => {
            errors.push("Payroll period end precedes period start".to_string());
        }
        (Some(_), Some(_)) => {}
        _ => errors.push("Payroll period dates are required".to_string()),
    }
    for (index, employee) in request.employees.iter().enumerate() {
        if employee.employee_id.trim().is_empty() {
            errors.push(format!("Employee {}: Employee ID is required", index + 1));
        }
        if employee.base_salary <= Decimal::ZERO {
            errors.push(format!("Employee {}: Valid base salary is required", index + 1));
        }
        for field in out_of_range_fields(employee) {
            errors.push(format!(
                "Employee {}: {field} exceeds the supported range of {MAX_INPUT_AMOUNT}",
                index + 1
            ));
        }
    }
    let region = match request.region.parse::<PayrollRegion>() {
        Ok(region) => Some(region),
        Err(error) => {
            errors.push(match error {
                BundleError::InvalidInput(message) => message,
                other => other.to_string(),
            });
            None
        }
    };

    match (region, request.period_start, request.period_end) {
        (Some(region), Some(start), Some(end)) if errors.is_empty() => Ok((region, start, end)),
        _ => Err(BundleError::Validation(errors)),
    }
}

fn out_of_range_fields(employee: &EmployeeInput) -> Vec<String> {
    let amounts = [
        ("base_salary", Some(employee.base_salary)),
        ("overtime_hours", Some(employee.overtime_hours)),
        ("commission", Some(employee.commission)),
        ("bonus", Some(employee.bonus)),
        ("health_insurance_deduction", employee.health_insurance_deduction),
        ("loan_emi", employee.loan_emi),
        ("retirement_contribution", employee.retirement_contribution),
        ("retirement_match_rate", employee.retirement_match_rate),
        ("life_insurance_coverage", employee.life_insurance_coverage),
    ];

    amounts
        .into_iter()
        .filter_map(|(name, amount)| amount.map(|amount| (name.to_string(), amount)))
        .chain(
            employee
                .voluntary_deductions
                .iter()
                .map(|(name, amount)| (format!("voluntary_{name}"), *amount)),
        )
        .filter(|(_, amount)| exceeds_input_range(*amount))
        .map(|(name, _)| name)
        .collect()
}

fn process_employee(employee: &EmployeeInput, region: PayrollRegion) -> EmployeePayroll {
    let earnings = earnings(employee);
    let gross_pay: Decimal = earnings.values().copied().sum();
    let deductions = deductions(employee, gross_pay, region);
    let benefits = benefits(employee, gross_pay);
    let total_deductions: Decimal = deductions.values().copied().sum();

    EmployeePayroll {
        employee_id: employee.employee_id.clone(),
        employee_name: employee.name.clone().unwrap_or_else(|| "Unknown".to_string()),
        earnings,
        deductions,
        benefits,
        gross_pay,
        total_deductions,
        net_pay: gross_pay - total_deductions,
    }
}

fn earnings(employee: &EmployeeInput) -> BTreeMap<String, Decimal> {
    let base = employee.base_salary;
    let hourly = base / Decimal::from(STANDARD_MONTHLY_HOURS);
    let mut components = vec![
        ("basic_salary", base),
        ("overtime_pay", employee.overtime_hours * hourly * pct(150, 0)),
        ("commission", employee.commission),
        ("bonus", employee.bonus),
    ];
    if matches!(employee.level.as_deref(), Some("manager" | "senior")) {
        components.push(("management_allowance", base * pct(10, 0)));
    }
    if employee.has_transport_allowance {
        components.push(("transport_allowance", Decimal::from(500)));
    }
    if employee.has_meal_allowance {
        components.push(("meal_allowance", Decimal::from(300)));
    }
    positive_components(components)
}

fn deductions(
    employee: &EmployeeInput,
    gross: Decimal,
    region: PayrollRegion,
) -> BTreeMap<String, Decimal> {
    let twelve = Decimal::from(12);
    let annual = gross * twelve;
    let income_tax = progressive_tax(annual, &region.income_tax_brackets()) / twelve;
    let mut components: Vec<(String, Decimal)> = Vec::new();

    match region {
        PayrollRegion::Us => {
            let social_security_base = annual.min(Decimal::from(US_SOCIAL_SECURITY_WAGE_BASE));
            components.push(("federal_income_tax".to_string(), income_tax));
            components
                .push(("social_security".to_string(), social_security_base * pct(62, 1) / twelve));
            components.push(("medicare".to_string(), gross * pct(145, 2)));
            components.push(("state_income_tax".to_string(), gross * pct(5, 0)));
        }
        PayrollRegion::In => {
            components.push(("income_tax".to_string(), income_tax));
            components.push((
                "provident_fund".to_string(),
                (gross * pct(12, 0)).min(Decimal::from(IN_PF_CAP)),
            ));
            if annual <= Decimal::from(IN_ESI_ANNUAL_LIMIT) {
                components.push(("esi".to_string(), gross * pct(75, 2)));
            }
            components.push(("professional_tax".to_string(), Decimal::from(200)));
        }
        PayrollRegion::Uk => {
            components.push(("income_tax".to_string(), income_tax));
            components.push(("national_insurance".to_string(), gross * pct(12, 0)));
            if annual > Decimal::from(UK_PENSION_THRESHOLD) {
                components.push(("pension_contribution".to_string(), gross * pct(5, 0)));
            }
        }
    }

    if let Some(amount) = employee.health_insurance_deduction {
        components.push(("health_insurance".to_string(), amount));
    }
    if let Some(amount) = employee.loan_emi {
        components.push(("loan_emi".to_string(), amount));
    }
    for (name, amount) in &employee.voluntary_deductions {
        components.push((format!("voluntary_{name}"), *amount));
    }

    components
        .into_iter()
        .map(|(name, amount)| (name, round_currency(amount)))
        .filter(|(_, amount)| *amount > Decimal::ZERO)
        .collect()
}

fn benefits(employee: &EmployeeInput, gross: Decimal) -> BTreeMap<String, Decimal> {
    let mut components = Vec::new();
    if employee.health_insurance_plan.as_deref().is_some_and(|plan| !plan.trim().is_empty()) {
        components.push(("health_insurance_employer", Decimal::from(400)));
    }
    if let Some(contribution) = employee.retirement_contribution {
        let match_rate = employee.retirement_match_rate.unwrap_or(pct(50, 0));
        components.push(("retirement_matching", (contribution * match_rate).min(gross * pct(6, 0))));
    }
    if employee.life_insurance_coverage.is_some_and(|coverage| coverage > Decimal::ZERO) {
        components.push(("life_insurance_premium", Decimal::from(50)));
    }
    positive_components(components)
}

/// Tax on `annual_income` where each bracket's rate applies only to the slice
/// of income between its threshold and the next one.
pub fn progressive_tax(annual_income: Decimal, brackets: &[(Decimal, Decimal)]) -> Decimal {
    let mut total = Decimal::ZERO;
    for (index, (threshold, rate)) in brackets.iter().enumerate() {
        if annual_income <= *threshold {
            break;
        }
        let upper = brackets
            .get(index + 1)
            .map(|(next, _)| annual_income.min(*next))
            .unwrap_or(annual_income);
        total += (upper - threshold) * rate;
    }
    total
}

fn employer_liabilities(
    results: &[EmployeePayroll],
    region: PayrollRegion,
    currency: &str,
) -> EmployerLiabilities {
    let total_gross_payroll: Decimal = results.iter().map(|result| result.gross_pay).sum();
    let levy_applies =
        total_gross_payroll * Decimal::from(12) > Decimal::from(UK_LEVY_ANNUAL_PAYROLL);

    let employer_taxes: Decimal = results
        .iter()
        .map(|result| {
            let gross = result.gross_pay;
            match region {
                PayrollRegion::Us => gross * (pct(62, 1) + pct(145, 2) + pct(6, 1)),
                PayrollRegion::In => {
                    let provident_fund = (gross * pct(12, 0)).min(Decimal::from(IN_PF_CAP));
                    let esi = if gross * Decimal::from(12) <= Decimal::from(IN_ESI_ANNUAL_LIMIT) {
                        gross * pct(325, 2)
                    } else {
                        Decimal::ZERO
                    };
                    provident_fund + esi
                }
                PayrollRegion::Uk => {
                    let levy = if levy_applies { gross * pct(5, 1) } else { Decimal::ZERO };
                    gross * pct(138, 1) + levy
                }
            }
        })
        .sum();
    let benefits_cost: Decimal =
        results.iter().flat_map(|result| result.benefits.values().copied()).sum();

    EmployerLiabilities {
        total_gross_payroll: round_currency(total_gross_payroll),
        employer_taxes: round_currency(employer_taxes),
        benefits_cost: round_currency(benefits_cost),
        total_employer_cost: round_currency(total_gross_payroll + employer_taxes + benefits_cost),
        region,
        currency: currency.to_string(),
    }
}

fn compliance(
    results: &[EmployeePayroll],
    region: PayrollRegion,
    period_end: NaiveDate,
    request: &PayrollRequest,
) -> PayrollCompliance {
    let sum_of = |keys: &[&str]| -> Decimal {
        results
            .iter()
            .flat_map(|result| keys.iter().filter_map(|key| result.deductions.get(*key)))
            .copied()
            .sum()
    };
    let due_date = filing_due_date(period_end);

    PayrollCompliance {
        total_income_tax_withheld: sum_of(&["federal_income_tax", "state_income_tax", "income_tax"]),
        total_social_security: sum_of(&["social_security", "provident_fund"]),
        compliance_status: "compliant".to_string(),
        regulatory_filings: region
            .filing_forms()
            .iter()
            .map(|form| RegulatoryFiling {
                form: form.to_string(),
                due_date,
                status: "pending".to_string(),
            })
            .collect(),
        processed_by: request.processed_by.clone().unwrap_or_else(|| "system".to_string()),
        approved_by: request.approved_by.clone(),
    }
}

/// Last day of the month following `period_end`.
pub fn filing_due_date(period_end: NaiveDate) -> NaiveDate {
    period_end
        .with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(2)))
        .and_then(|first_after_next| first_after_next.pred_opt())
        .unwrap_or(period_end)
}

fn positive_components(components: Vec<(&str, Decimal)>) -> BTreeMap<String, Decimal> {
    components
        .into_iter()
        .map(|(name, amount)| (name.to_string(), round_currency(amount)))
        .filter(|(_, amount)| *amount > Decimal::ZERO)
        .collect()
}

/// `pct(62, 1)` is 6.2% expressed as a fraction.
fn pct(value: i64, scale: u32) -> Decimal {
    Decimal::new(value, scale) / Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::bundles::BundleError;

    use super::{
        filing_due_date, progressive_tax, EmployeeInput, PayrollEngine, PayrollRegion,
        PayrollRequest,
    };

    fn dec(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn employee(id: &str, base_salary: &str) -> EmployeeInput {
        EmployeeInput {
            employee_id: id.to_string(),
            base_salary: dec(base_salary),
            ..EmployeeInput::default()
        }
    }

    fn request(region: &str, employees: Vec<EmployeeInput>) -> PayrollRequest {
        PayrollRequest {
            employees,
            period_start: Some(date(2024, 8, 1)),
            period_end: Some(date(2024, 8, 31)),
            pay_date: Some(date(2024, 9, 5)),
            region: region.to_string(),
            currency: "USD".to_string(),
            processed_by: None,
            approved_by: Some("controller".to_string()),
        }
    }

    #[test]
    fn us_run_matches_hand_computed_figures() {
        let manager = EmployeeInput {
            name: Some("John Smith".to_string()),
            level: Some("manager".to_string()),
            has_transport_allowance: true,
            health_insurance_deduction: Some(dec("250")),
            overtime_hours: dec("10"),
            bonus: dec("1000"),
            ..employee("EMP001", "8000")
        };
        let senior = EmployeeInput {
            level: Some("senior".to_string()),
            has_meal_allowance: true,
            retirement_contribution: Some(dec("500")),
            retirement_match_rate: Some(dec("0.5")),
            ..employee("EMP002", "6500")
        };

        let summary = PayrollEngine
            .process_payroll(&request("US", vec![manager, senior]))
            .expect("payroll");

        let first = &summary.employee_results[0];
        assert_eq!(first.earnings.get("overtime_pay"), Some(&dec("750.00")));
        assert_eq!(first.earnings.get("management_allowance"), Some(&dec("800.00")));
        assert_eq!(first.gross_pay, dec("11050.00"));
        assert_eq!(first.deductions.get("federal_income_tax"), Some(&dec("2153.75")));
        assert_eq!(first.deductions.get("social_security"), Some(&dec("685.10")));
        assert_eq!(first.deductions.get("medicare"), Some(&dec("160.23")));
        assert_eq!(first.net_pay, dec("7248.42"));
        assert!(!first.earnings.contains_key("commission"));

        let second = &summary.employee_results[1];
        assert_eq!(second.employee_name, "Unknown");
        assert_eq!(second.gross_pay, dec("7450.00"));
        assert_eq!(second.total_deductions, dec("2232.18"));
        assert_eq!(second.benefits.get("retirement_matching"), Some(&dec("250.00")));

        assert_eq!(summary.summary.total_gross_pay, dec("18500.00"));
        assert_eq!(summary.summary.total_net_pay, dec("12466.24"));
        assert_eq!(summary.employer_liabilities.employer_taxes, dec("1526.25"));
        assert_eq!(summary.employer_liabilities.total_employer_cost, dec("20276.25"));
        assert_eq!(summary.compliance.total_income_tax_withheld, dec("4368.50"));
        assert_eq!(summary.compliance.total_social_security, dec("1147.00"));
        assert_eq!(summary.compliance.processed_by, "system");
        assert_eq!(summary.compliance.regulatory_filings.len(), 2);
        assert_eq!(summary.compliance.regulatory_filings[0].due_date, date(2024, 9, 30));
    }

    #[test]
    fn india_applies_pf_cap_and_esi() {
        let summary =
            PayrollEngine.process_payroll(&request("IN", vec![employee("IN-1", "20000")])).expect("payroll");
        let result = &summary.employee_results[0];

        assert!(!result.deductions.contains_key("income_tax"));
        assert_eq!(result.deductions.get("provident_fund"), Some(&dec("1800.00")));
        assert_eq!(result.deductions.get("esi"), Some(&dec("150.00")));
        assert_eq!(result.deductions.get("professional_tax"), Some(&dec("200.00")));
        assert_eq!(result.net_pay, dec("17850.00"));
        assert_eq!(summary.employer_liabilities.employer_taxes, dec("2450.00"));
        assert_eq!(summary.compliance.regulatory_filings[0].form, "24Q");
    }

    #[test]
    fn uk_levy_applies_only_to_large_runs() {
        let small =
            PayrollEngine.process_payroll(&request("uk", vec![employee("UK-1", "5000")])).expect("payroll");
        let result = &small.employee_results[0];
        assert_eq!(result.deductions.get("income_tax"), Some(&dec("952.67")));
        assert_eq!(result.deductions.get("national_insurance"), Some(&dec("600.00")));
        assert_eq!(result.deductions.get("pension_contribution"), Some(&dec("250.00")));
        assert_eq!(small.employer_liabilities.employer_taxes, dec("690.00"));

        let staff = (0..60).map(|index| employee(&format!("UK-{index}"), "5000")).collect();
        let large = PayrollEngine.process_payroll(&request("UK", staff)).expect("payroll");
        assert_eq!(large.employer_liabilities.total_gross_payroll, dec("300000.00"));
        assert_eq!(large.employer_liabilities.employer_taxes, dec("42900.00"));
    }

    #[test]
    fn validation_collects_every_problem() {
        let mut invalid = request("FR", vec![employee("", "0")]);
        invalid.period_end = None;

        let error = PayrollEngine.process_payroll(&invalid).expect_err("invalid payroll");
        let BundleError::Validation(errors) = error else {
            panic!("expected validation errors");
        };
        assert_eq!(
            errors,
            vec![
                "Payroll period dates are required".to_string(),
                "Employee 1: Employee ID is required".to_string(),
                "Employee 1: Valid base salary is required".to_string(),
                "Unsupported payroll region `FR`".to_string(),
            ]
        );
    }

    #[test]
    fn amounts_beyond_supported_range_are_rejected() {
        let mut huge = employee("EMP-HUGE", "7000000000000000000000000000");
        huge.voluntary_deductions.insert("gym".to_string(), dec("-2000000000000"));
        let error = PayrollEngine
            .process_payroll(&request("US", vec![huge, employee("EMP-OK", "4000")]))
            .expect_err("out of range salary");

        let BundleError::Validation(errors) = error else {
            panic!("expected validation errors");
        };
        assert_eq!(
            errors,
            vec![
                "Employee 1: base_salary exceeds the supported range of 1000000000000".to_string(),
                "Employee 1: voluntary_gym exceeds the supported range of 1000000000000"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn largest_accepted_amounts_do_not_overflow() {
        let top = EmployeeInput {
            overtime_hours: dec("1000000000000"),
            commission: dec("1000000000000"),
            bonus: dec("1000000000000"),
            level: Some("manager".to_string()),
            retirement_contribution: Some(dec("1000000000000")),
            retirement_match_rate: Some(dec("1000000000000")),
            ..employee("EMP-TOP", "1000000000000")
        };
        let staff = vec![top; 3];

        for region in ["US", "IN", "UK"] {
            let summary =
                PayrollEngine.process_payroll(&request(region, staff.clone())).expect("payroll");
            assert!(summary.summary.total_gross_pay > Decimal::ZERO);
        }
    }

    #[test]
    fn reversed_period_is_rejected() {
        let mut reversed = request("US", vec![employee("E1", "1000")]);
        reversed.period_start = Some(date(2024, 9, 1));
        assert!(matches!(
            PayrollEngine.process_payroll(&reversed),
            Err(BundleError::Validation(errors)) if errors.len() == 1
        ));
    }

    #[test]
    fn progressive_tax_only_taxes_each_slice_once() {
        let brackets = PayrollRegion::Us.income_tax_brackets();
        assert_eq!(progressive_tax(dec("9950"), &brackets), dec("995"));
        assert_eq!(progressive_tax(dec("132600"), &brackets), dec("25845"));
        assert_eq!(progressive_tax(Decimal::ZERO, &brackets), Decimal::ZERO);
    }

    #[test]
    fn filings_fall_due_at_end_of_following_month() {
        assert_eq!(filing_due_date(date(2024, 1, 31)), date(2024, 2, 29));
        assert_eq!(filing_due_date(date(2024, 12, 15)), date(2025, 1, 31));
    }
}
