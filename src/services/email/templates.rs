//! HTML email bodies. Visitor-supplied text is escaped; newsletter content
//! written by an admin is sanitized instead so its markup survives.

use crate::config::Branding;
use crate::db::models::{Booking, Client, EventType};

/// Subject and HTML body of one email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub html: String,
}

fn esc(text: &str) -> String {
    ammonia::clean_text(text)
}

/// Escapes and keeps line breaks visible.
fn multiline(text: &str) -> String {
    esc(text).replace("&#10;", "<br>")
}

fn layout(branding: &Branding, content: &str, footer: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <style>
    body {{ font-family: 'Inter', Arial, sans-serif; line-height: 1.6; color: #1A1A1A; }}
    .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
    .header {{ text-align: center; padding: 30px 0; background: linear-gradient(135deg, #FFFEF7 0%, #F7E7CE 100%); }}
    .logo {{ font-family: 'Great Vibes', cursive; font-size: 36px; color: #D4AF37; }}
    .content {{ padding: 30px; background: white; }}
    .label {{ font-weight: bold; color: #D4AF37; }}
    .footer {{ text-align: center; padding: 20px; color: #666; font-size: 12px; }}
  </style>
</head>
<body>
  <div class="container">
    <div class="header"><div class="logo">{name}</div></div>
    <div class="content">{content}</div>
    <div class="footer">{footer}</div>
  </div>
</body>
</html>"#,
        name = esc(&branding.business_name),
        content = content,
        footer = footer,
    )
}

fn contact_footer(branding: &Branding, lang: Lang) -> String {
    let prefix = match lang {
        Lang::Fr => "Pour toute question, contactez-nous à",
        Lang::En => "Any question? Reach us at",
    };
    format!(
        "<p>{} {}</p>",
        prefix,
        esc(&branding.contact_email)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lang {
    Fr,
    En,
}

impl Lang {
    fn from_code(code: &str) -> Self {
        if code.trim().eq_ignore_ascii_case("en") {
            Lang::En
        } else {
            Lang::Fr
        }
    }
}

fn event_label(event_type: EventType, lang: Lang) -> &'static str {
    match (event_type, lang) {
        (EventType::Proposal, Lang::Fr) => "demande en mariage",
        (EventType::Wedding, Lang::Fr) => "mariage",
        (EventType::Birthday, Lang::Fr) => "anniversaire",
        (EventType::BabyShower, Lang::Fr) => "baby shower",
        (EventType::Corporate, Lang::Fr) => "événement d'entreprise",
        (EventType::Other, Lang::Fr) => "événement",
        (EventType::Proposal, Lang::En) => "proposal",
        (EventType::Wedding, Lang::En) => "wedding",
        (EventType::Birthday, Lang::En) => "birthday",
        (EventType::BabyShower, Lang::En) => "baby shower",
        (EventType::Corporate, Lang::En) => "corporate event",
        (EventType::Other, Lang::En) => "event",
    }
}

/// Acknowledgement sent to the client, in the booking's language (`fr` unless `en`).
pub fn booking_confirmation(branding: &Branding, client: &Client, booking: &Booking) -> Rendered {
    let lang = Lang::from_code(&booking.language);
    let name = esc(&client.name);
    let event = event_label(booking.event_type, lang);
    let date = booking.event_date.format("%d/%m/%Y");
    let business = esc(&branding.business_name);

    let (subject, content) = match lang {
        Lang::Fr => (
            format!("Confirmation de votre réservation - {}", branding.business_name),
            format!(
                "<h2>Merci pour votre réservation !</h2>\
                 <p>Bonjour {name},</p>\
                 <p>Nous avons bien reçu votre demande pour votre <strong>{event}</strong> \
                 prévu le <strong>{date}</strong>.</p>\
                 <p>Notre équipe va examiner votre demande et vous contactera sous peu \
                 pour confirmer tous les détails.</p>\
                 <p>Cordialement,<br><strong>L'équipe {business}</strong></p>"
            ),
        ),
        Lang::En => (
            format!("Your booking request - {}", branding.business_name),
            format!(
                "<h2>Thank you for your booking!</h2>\
                 <p>Hello {name},</p>\
                 <p>We have received your request for your <strong>{event}</strong> \
                 on <strong>{date}</strong>.</p>\
                 <p>Our team will review it and get back to you shortly to confirm \
                 every detail.</p>\
                 <p>Kind regards,<br><strong>The {business} team</strong></p>"
            ),
        ),
    };

    Rendered {
        subject,
        html: layout(branding, &content, &contact_footer(branding, lang)),
    }
}

/// Tells the business owner a new booking arrived.
pub fn admin_booking_notification(branding: &Branding, client: &Client, booking: &Booking) -> Rendered {
    let content = format!(
        "<h2>Nouvelle réservation #{id}</h2>\
         <p><span class=\"label\">Client :</span> {name} ({email}, {phone})</p>\
         <p><span class=\"label\">Événement :</span> {event} le {date}</p>\
         <p><span class=\"label\">Lieu :</span> {location}</p>\
         <p><span class=\"label\">Invités :</span> {guests}</p>\
         <p><span class=\"label\">Budget :</span> {budget:.2} € (acompte {deposit:.2} €)</p>\
         <p><span class=\"label\">Message :</span> {message}</p>\
         <p><span class=\"label\">Demandes particulières :</span> {requests}</p>",
        id = booking.id,
        name = esc(&client.name),
        email = esc(&client.email),
        phone = esc(&client.phone),
        event = event_label(booking.event_type, Lang::Fr),
        date = booking.event_date.format("%d/%m/%Y"),
        location = esc(&booking.event_location),
        guests = booking.guest_count,
        budget = booking.budget,
        deposit = booking.deposit_amount,
        message = esc(&booking.message),
        requests = esc(&booking.special_requests),
    );

    Rendered {
        subject: format!("Nouvelle réservation - {}", client.name),
        html: layout(branding, &content, ""),
    }
}

/// Contact-form submission relayed to the business owner.
pub fn contact_relay(
    branding: &Branding,
    name: &str,
    email: &str,
    phone: &str,
    subject: &str,
    message: &str,
) -> Rendered {
    let content = format!(
        "<h2>Nouvelle demande de contact</h2>\
         <p><span class=\"label\">Nom :</span> {}</p>\
         <p><span class=\"label\">Email :</span> {}</p>\
         <p><span class=\"label\">Téléphone :</span> {}</p>\
         <p><span class=\"label\">Sujet :</span> {}</p>\
         <p><span class=\"label\">Message :</span><br>{}</p>",
        esc(name),
        esc(email),
        esc(phone),
        esc(subject),
        multiline(message),
    );

    Rendered {
        subject: format!("Nouvelle demande de contact - {}", name),
        html: layout(branding, &content, ""),
    }
}

/// Newsletter issue for one subscriber, with that subscriber's unsubscribe link.
pub fn newsletter(branding: &Branding, subject: &str, content_html: &str, unsubscribe_url: &str) -> Rendered {
    let footer = format!(
        "<p>{}</p><p><a href=\"{}\" style=\"color: #D4AF37;\">Se désabonner</a></p>",
        esc(&branding.business_name),
        unsubscribe_url,
    );

    Rendered {
        subject: subject.to_string(),
        html: layout(branding, &ammonia::clean(content_html), &footer),
    }
}

/// Free-form message from the admin to one client.
pub fn custom_message(branding: &Branding, client_name: &str, subject: &str, message: &str) -> Rendered {
    let content = format!(
        "<p>Bonjour {},</p><p>{}</p><p><strong>L'équipe {}</strong></p>",
        esc(client_name),
        multiline(message),
        esc(&branding.business_name),
    );

    Rendered {
        subject: subject.to_string(),
        html: layout(branding, &content, &contact_footer(branding, Lang::Fr)),
    }
}
