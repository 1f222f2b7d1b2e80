//! Message text for schedules, welcomes and the date picker.
//!
//! Everything here is pure: the same snapshot, date and mode always produce
//! byte-identical text, which is what lets a repeated edit be recognised as
//! a no-op by the messenger.

use std::time::Duration;

use chrono::{Days, NaiveDate};

use crate::{
    calendar::{long_label, short_label},
    formatting::escape_html,
    messaging::types::{InlineButton, InlineKeyboard},
    reservations::ScheduleSnapshot,
};

const DATE_CALLBACK_PREFIX: &str = "date:";

/// Which trigger the text is rendered for. Only affects the footer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Private-chat answer; no footer.
    Plain,
    /// Tracked message refreshed by an admin.
    Manual,
    /// Tracked message refreshed by the periodic sweep.
    Auto,
    /// Group answer that is deleted after `visible_for`.
    Ephemeral { visible_for: Duration },
}

/// Render one day's schedule. `None` means the feed could not be reached.
pub fn render_schedule(
    snapshot: Option<&ScheduleSnapshot>,
    date: NaiveDate,
    mode: RenderMode,
) -> String {
    with_footer(&schedule_body(snapshot, date), mode)
}

/// The schedule without its footer.
pub fn schedule_body(snapshot: Option<&ScheduleSnapshot>, date: NaiveDate) -> String {
    let date_label = escape_html(&long_label(date));

    match snapshot {
        None => format!(
            "⚠️ در حال حاضر امکان دریافت برنامه رزرواسیون برای {date_label} وجود ندارد.\n\
             لطفا کمی بعد دوباره تلاش کنید.\n"
        ),
        Some(s) if s.is_empty() => {
            format!("😕 متاسفانه اطلاعاتی برای تاریخ {date_label} پیدا نشد.\n")
        }
        Some(s) => {
            let mut body = format!("📅 <b>برنامه رزرواسیون برای {date_label}</b>\n\n");
            for court in &s.courts {
                body.push_str(&format!("🎾 <b>زمین: {}</b>\n", escape_html(&court.name)));
                if court.slots.is_empty() {
                    body.push_str("هیچ سانس خالی برای این زمین وجود ندارد.\n");
                }
                for slot in &court.slots {
                    let start = escape_html(&slot.start_time);
                    if slot.is_available {
                        body.push_str(&format!("✅ <code>{start}</code> - قابل رزرو\n"));
                    } else {
                        let who = slot.occupant.as_deref().unwrap_or("شخصی");
                        body.push_str(&format!(
                            "❌ <code>{start}</code> - رزرو شده توسط {}\n",
                            escape_html(who)
                        ));
                    }
                }
                body.push('\n');
            }
            body
        }
    }
}

/// Append the footer for `mode` to a rendered body.
pub fn with_footer(body: &str, mode: RenderMode) -> String {
    let mut out = body.to_string();
    match mode {
        RenderMode::Plain => {}
        RenderMode::Manual => out.push_str("\n🔄 <i>بروزرسانی توسط مدیر گروه</i>"),
        RenderMode::Auto => out.push_str("\n🔄 <i>بروزرسانی خودکار</i>"),
        RenderMode::Ephemeral { visible_for } => out.push_str(&format!(
            "\n🗑️ <i>این پیام تا {} ثانیه دیگر حذف می‌شود.</i>",
            visible_for.as_secs()
        )),
    }

    out.trim_end().to_string()
}

/// "Today" / "tomorrow" buttons; callback data carries the ISO date.
pub fn date_keyboard(today: NaiveDate) -> InlineKeyboard {
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    InlineKeyboard::single_row(vec![
        InlineButton {
            label: format!("امروز - {}", short_label(today)),
            callback_data: date_callback_data(today),
        },
        InlineButton {
            label: format!("فردا - {}", short_label(tomorrow)),
            callback_data: date_callback_data(tomorrow),
        },
    ])
}

pub fn date_callback_data(date: NaiveDate) -> String {
    format!("{DATE_CALLBACK_PREFIX}{}", date.format("%Y-%m-%d"))
}

/// Accepts `date:YYYY-MM-DD` and bare `YYYY-MM-DD` (keyboards posted by
/// older deployments carry the bare form).
pub fn parse_date_callback(data: &str) -> Option<NaiveDate> {
    let raw = data.strip_prefix(DATE_CALLBACK_PREFIX).unwrap_or(data);
    parse_iso_date(raw)
}

pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub fn private_welcome() -> &'static str {
    "به ربات رزرو تنیس آرسس خوش آمدید! 🎾\n\n\
     لطفا برای مشاهده برنامه، یکی از روزهای زیر را انتخاب کنید:"
}

pub fn pick_another_day() -> &'static str {
    "می‌توانید روز دیگری را انتخاب کنید:"
}

pub fn please_wait(date: NaiveDate) -> String {
    format!(
        "لطفا صبر کنید، در حال دریافت برنامه برای تاریخ {}...",
        escape_html(&long_label(date))
    )
}

pub fn date_received(date: NaiveDate) -> String {
    format!(
        "دریافت شد! در حال دریافت برنامه برای تاریخ {}...",
        escape_html(&long_label(date))
    )
}

pub fn bad_date_hint() -> &'static str {
    "متاسفم، فرمت قابل فهم نیست. لطفا تاریخ را به صورت <code>YYYY-MM-DD</code> ارسال کنید."
}

pub fn groups_only() -> &'static str {
    "این دستور فقط در گروه‌ها قابل استفاده است."
}

pub fn admins_only() -> &'static str {
    "فقط ادمین گروه می‌تواند از این دستور استفاده کند."
}

pub fn cooling_down(retry_after: Duration) -> String {
    // Round up so "0 seconds" is never shown.
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    format!("⏳ برنامه به تازگی بروزرسانی شده است. لطفا {secs} ثانیه دیگر دوباره تلاش کنید.")
}

pub fn refresh_done() -> &'static str {
    "✅ برنامه بروزرسانی شد."
}

pub fn refresh_unchanged() -> &'static str {
    "ℹ️ برنامه تغییری نکرده است."
}

pub fn not_tracked() -> &'static str {
    "ℹ️ پیام برنامه‌ای در این گروه ثبت نشده است. برای ارسال پیام برنامه از دستور /track استفاده کنید."
}

pub fn recreated_notice() -> &'static str {
    "ℹ️ پیام قبلی برنامه پیدا نشد و پیام جدیدی ارسال شد. لطفا پیام جدید را پین کنید."
}

pub fn refresh_failed() -> &'static str {
    "⚠️ بروزرسانی برنامه در حال حاضر ممکن نیست. لطفا کمی بعد دوباره تلاش کنید."
}

pub fn tracking_started() -> &'static str {
    "📌 پیام برنامه ارسال شد و به صورت خودکار بروزرسانی می‌شود. پیشنهاد می‌شود آن را پین کنید."
}

pub fn tracking_stopped(had_message: bool) -> &'static str {
    if had_message {
        "🛑 بروزرسانی خودکار برنامه در این گروه متوقف شد."
    } else {
        "ℹ️ پیام برنامه‌ای در این گروه ثبت نشده بود."
    }
}

pub fn storage_trouble() -> &'static str {
    "⚠️ خطای داخلی رخ داد. لطفا کمی بعد دوباره تلاش کنید."
}

pub fn broadcast_usage() -> &'static str {
    "استفاده: <code>/broadcast متن پیام</code>"
}

pub fn broadcast_report(succeeded: usize, failed: usize) -> String {
    format!("📣 پیام ارسال شد.\nموفق: {succeeded}\nناموفق: {failed}")
}

pub fn stats_report(manual: u64, auto: u64, tracked_chats: usize) -> String {
    format!(
        "📊 <b>آمار ربات</b>\n\n\
         گروه‌های فعال: {tracked_chats}\n\
         بروزرسانی دستی: {manual}\n\
         بروزرسانی خودکار: {auto}"
    )
}

/// Links shown in the pinned group welcome.
#[derive(Clone, Debug)]
pub struct ClubLinks {
    pub website_url: String,
    pub contact_phone: Option<String>,
}

pub fn group_welcome(today: NaiveDate, links: &ClubLinks) -> String {
    let site = escape_html(links.website_url.trim_end_matches('/'));
    let mut out = format!(
        "🎾 <b>به گروه آکادمی تنیس آرسس خوش آمدید! (بروزرسانی {})</b>\n\n\
         در این گروه می‌توانید از آخرین وضعیت سانس‌های خالی مطلع شوید. \
         برای دسترسی سریع، لینک‌های زیر را دنبال کنید:\n\n\
         🌐 <b>وب‌سایت آکادمی:</b> <a href=\"{site}\">{site}</a>\n\
         📅 <b>بخش رزرواسیون آنلاین:</b> <a href=\"{site}/reservations\">{site}/reservations</a>\n",
        escape_html(&long_label(today)),
    );
    if let Some(phone) = links.contact_phone.as_deref() {
        out.push_str(&format!(
            "📞 <b>تماس با مدیریت:</b> {}\n",
            escape_html(phone)
        ));
    }
    out.push_str(
        "\n👇 برای مشاهده سانس‌های آزاد <b>امروز</b> و <b>فردا</b>، روی دکمه‌های زیر کلیک کنید. \
         پیشنهاد می‌شود این پیام را در گروه پین کنید.",
    );
    out
}
