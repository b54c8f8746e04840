//! Booking analytics for the admin desk

use coach_core::{
    models::{Booking, BookingStatus},
    traits::BookingRepository,
    AppResult,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Bookings read per page while aggregating
const PAGE_SIZE: i64 = 500;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBucket {
    /// `YYYY-MM` of booking creation
    pub month: String,
    pub bookings: usize,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingAnalytics {
    pub total_bookings: usize,
    /// Sum of confirmed and completed totals
    pub total_revenue: Decimal,
    pub by_status: StatusCounts,
    /// Oldest month first
    pub monthly: Vec<MonthlyBucket>,
}

/// Aggregate a set of bookings
pub fn summarize(bookings: &[Booking]) -> BookingAnalytics {
    let mut by_status = StatusCounts::default();
    let mut total_revenue = Decimal::ZERO;
    let mut months: BTreeMap<String, (usize, Decimal)> = BTreeMap::new();

    for booking in bookings {
        match booking.status {
            BookingStatus::Pending => by_status.pending += 1,
            BookingStatus::Confirmed => by_status.confirmed += 1,
            BookingStatus::Cancelled => by_status.cancelled += 1,
            BookingStatus::Completed => by_status.completed += 1,
        }

        let paid = if booking.status.is_paid() {
            booking.total_amount
        } else {
            Decimal::ZERO
        };
        total_revenue += paid;

        let bucket = months
            .entry(booking.created_at.format("%Y-%m").to_string())
            .or_insert((0, Decimal::ZERO));
        bucket.0 += 1;
        bucket.1 += paid;
    }

    BookingAnalytics {
        total_bookings: bookings.len(),
        total_revenue,
        by_status,
        monthly: months
            .into_iter()
            .map(|(month, (bookings, revenue))| MonthlyBucket {
                month,
                bookings,
                revenue,
            })
            .collect(),
    }
}

pub struct AnalyticsService {
    bookings: Arc<dyn BookingRepository>,
}

impl AnalyticsService {
    pub fn new(bookings: Arc<dyn BookingRepository>) -> Self {
        Self { bookings }
    }

    pub async fn booking_analytics(&self) -> AppResult<BookingAnalytics> {
        let total = self.bookings.count().await?;
        let mut all = Vec::with_capacity(total.max(0) as usize);

        let mut offset = 0;
        while offset < total {
            let page = self.bookings.find_all(PAGE_SIZE, offset).await?;
            if page.is_empty() {
                break;
            }
            offset += page.len() as i64;
            all.extend(page);
        }

        Ok(summarize(&all))
    }
}
