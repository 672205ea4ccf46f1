use rust_decimal::{Decimal, RoundingStrategy};

pub fn write_csv<I, R, W>(records: I, writer: W) -> anyhow::Result<()>
where
    I: IntoIterator<Item = R>,
    R: serde::Serialize,
    W: std::io::Write,
{
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records.into_iter() {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Pounds rounded half away from zero to the penny
pub fn format_gbp(amount: Decimal) -> String {
    let amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if amount < Decimal::ZERO {
        format!("-£{:.2}", amount.abs())
    } else {
        format!("£{:.2}", amount)
    }
}

pub fn format_quantity(qty: Decimal) -> String {
    let qty = qty.round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero);
    let s = format!("{:.8}", qty);
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn gbp_rounds_at_presentation() {
        assert_eq!(format_gbp(dec!(1234.5678)), "£1234.57");
        assert_eq!(format_gbp(dec!(-50)), "-£50.00");
        assert_eq!(format_gbp(dec!(10.999)), "£11.00");
    }

    #[test]
    fn gbp_midpoints_round_away_from_zero() {
        assert_eq!(format_gbp(dec!(0.125)), "£0.13");
        assert_eq!(format_gbp(dec!(-0.125)), "-£0.13");
        assert_eq!(format_gbp(dec!(-2.344)), "-£2.34");
    }

    #[test]
    fn quantity_drops_trailing_zeros() {
        assert_eq!(format_quantity(dec!(10)), "10");
        assert_eq!(format_quantity(dec!(0.12500000)), "0.125");
        assert_eq!(format_quantity(dec!(0.333333335)), "0.33333334");
        assert_eq!(format_quantity(dec!(1.999999999)), "2");
    }

    #[test]
    fn csv_rows_are_serialized() {
        #[derive(serde::Serialize)]
        struct Row {
            a: u32,
            b: &'static str,
        }
        let mut out = Vec::new();
        write_csv([Row { a: 1, b: "x" }], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a,b\n1,x\n");
    }
}
