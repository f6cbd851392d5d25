/// Returns the two account IDs in the order their row locks must be taken.
///
/// Always ascending by ID, regardless of which side is debited. Every
/// concurrent transfer acquiring locks in this one total order is what rules
/// out circular waits between transfers that touch the same accounts in
/// opposite directions.
pub fn lock_order(account_a: i64, account_b: i64) -> (i64, i64) {
    if account_a <= account_b {
        (account_a, account_b)
    } else {
        (account_b, account_a)
    }
}
